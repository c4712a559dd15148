mod con_window;
mod game_filter;
mod player_bounds;
mod priority;

pub use con_window::*;
pub use game_filter::*;
pub use player_bounds::*;
pub use priority::*;
