pub mod packs;
pub mod rank;
pub mod settings;
