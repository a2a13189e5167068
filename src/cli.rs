use clap::Parser;

/// Ask an AI model a question from the terminal and stream the answer.
#[derive(Debug, Parser)]
#[command(name = "glyph")]
#[command(version)]
#[command(about = "Ask an AI model from the terminal", long_about = None)]
pub struct Args {
    /// Provider: groq, ollama or claude (default: config ai_provider or "groq")
    #[arg(short = 'p', long = "provider")]
    pub provider: Option<String>,

    /// Model name (default: config ai_model or the provider's default)
    #[arg(short = 'm', long = "model")]
    pub model: Option<String>,

    /// Ollama server address
    #[arg(long = "host", value_name = "URL")]
    pub host: Option<String>,

    /// Replace the default system prompt
    #[arg(long = "system", value_name = "TEXT")]
    pub system: Option<String>,

    /// Skip automatic directory context injection
    #[arg(long = "no-context")]
    pub no_context: bool,

    /// Question text; piped stdin is prepended to it
    #[arg(value_name = "PROMPT", required = true)]
    pub prompt: Vec<String>,
}
