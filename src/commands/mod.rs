pub mod export;

pub use export::ExportCommand;
