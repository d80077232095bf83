pub mod detect;
pub mod openai;
pub mod places;
pub mod whisper;
pub mod ytdlp;
