use renderfleet::app::command_handlers;

fn output_header() -> &'static str {
    "RenderFleet node\nFilesystem-driven render job daemon."
}

fn run() -> Result<(), String> {
    println!("{}\n", output_header());
    let args: Vec<String> = std::env::args().skip(1).collect();
    let output = command_handlers::run_cli(args)?;
    println!("{output}");
    Ok(())
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
