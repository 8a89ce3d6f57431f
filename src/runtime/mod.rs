pub mod array;
pub mod convert;
pub mod element;
pub mod engine;
pub mod error;
pub mod interval;
pub mod ops;
pub mod printer;
pub mod reader;
pub mod stack;
pub mod tuple;
pub mod value;
pub mod view;

pub use engine::Engine;
