mod entry;
mod game;
mod player;
mod slot;

pub use entry::*;
pub use game::*;
pub use player::*;
pub use slot::*;
