use anyhow::Result;
use argh::FromArgs;
use shell308::{DEFAULT_PROMPT, Interpreter, Terminal, logging};

#[derive(FromArgs, Debug, PartialEq)]
/// Interactive command interpreter.
struct Cli {
    #[argh(option, short = 'p')]
    /// text shown before each command line
    prompt: Option<String>,
}

impl Cli {
    /// Parses `args` (program name first). `None` for anything but `[-p <prompt>]`.
    fn parse(args: &[String]) -> Option<Self> {
        let (program, rest) = args.split_first()?;
        let rest: Vec<&str> = rest.iter().map(String::as_str).collect();
        Cli::from_args(&[program.as_str()], &rest).ok()
    }
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let Some(cli) = Cli::parse(&args) else {
        let program = args.first().map(String::as_str).unwrap_or("shell308");
        println!("Usage: {program} -p <prompt>");
        return Ok(());
    };

    logging::init();

    let prompt = cli.prompt.unwrap_or_else(|| DEFAULT_PROMPT.to_owned());
    let mut input = Terminal::new()?;
    Interpreter::new(prompt).repl(&mut input);
    Ok(())
}
