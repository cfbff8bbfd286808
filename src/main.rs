use sap::cli::run;
use sap::error::{ErrorClass, SapError};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    if let Err(e) = run() {
        match SapError::classify(&e) {
            ErrorClass::BadRequest => {
                // User error
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
            ErrorClass::Internal => {
                eprintln!("Internal error: {}", e);
                // Show error chain if available
                let mut chain = e.chain().skip(1).peekable();
                if chain.peek().is_some() {
                    eprintln!("\nCaused by:");
                    for (indent, cause) in chain.enumerate() {
                        eprintln!("{:indent$}  {}", "", cause, indent = indent + 1);
                    }
                }
                std::process::exit(2);
            }
        }
    }
}
