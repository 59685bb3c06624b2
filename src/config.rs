use crate::interpreter::DEFAULT_PROMPT;
use argh::FromArgs;

#[derive(FromArgs, Debug)]
/// Interactive shell with foreground and background job control.
pub struct Options {
    #[argh(option, default = "DEFAULT_PROMPT.to_string()")]
    /// text printed before each input line.
    pub prompt: String,

    #[argh(option, default = "String::from(\"warn\")")]
    /// log filter written to stderr, e.g. `info` or `job_shell=debug`.
    pub log_level: String,

    #[argh(switch, short = 'q')]
    /// do not print the welcome and goodbye banners.
    pub quiet: bool,
}
