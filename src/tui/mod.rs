pub(crate) mod crossterm;
pub(crate) mod events;
pub(crate) mod renderer;
