pub mod economy;
pub mod equipment;
pub mod item;
pub mod net;
pub mod ore;
pub mod player;
pub mod reveal;
pub mod time;
pub mod zone;
