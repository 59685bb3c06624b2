use job_shell::config::Options;
use job_shell::{Interpreter, Terminal};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let options: Options = argh::from_env();

    let filter = EnvFilter::try_new(&options.log_level).unwrap_or_else(|e| {
        eprintln!("invalid --log-level {:?}: {e}", options.log_level);
        EnvFilter::new("warn")
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if !options.quiet {
        println!("\nWelcome to jobsh");
    }

    let mut sh = Interpreter::new(Terminal::attach()).with_prompt(options.prompt);
    let status = match sh.repl() {
        Ok(status) => status,
        Err(e) => {
            eprintln!("Error: {e:?}");
            return ExitCode::FAILURE;
        }
    };

    if !options.quiet {
        println!("Goodbye!");
    }
    ExitCode::from(u8::try_from(status).unwrap_or(1))
}
