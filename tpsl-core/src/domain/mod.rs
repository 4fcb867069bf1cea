//! Domain types shared by both trigger engines

pub mod position;
pub mod side;

pub use position::Position;
pub use side::Side;
