mod cmd;

use clap::Parser;

pub fn main() {
    tracing_subscriber::fmt::init();

    let cmd = cmd::MainCmd::parse();
    if let Err(err) = cmd.run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
