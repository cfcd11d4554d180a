pub mod gpt2;

pub use gpt2::Gpt2Model;
