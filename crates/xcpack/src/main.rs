use xcpack_sdk::PackError;

fn main() {
    if let Err(err) = xcpack::run() {
        match err.downcast_ref::<PackError>() {
            // clap already rendered a complete message with usage.
            Some(PackError::Usage(message)) => eprint!("{}", message),
            _ => eprintln!("error: {:#}", err),
        }
        std::process::exit(xcpack::exit_code(&err));
    }
}
