pub mod google;
pub mod ollama;
