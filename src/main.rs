fn main() {
    if let Err(e) = hamediabridge_lib::run() {
        eprintln!("HA Media Bridge failed to start: {}", e);
        std::process::exit(1);
    }
}
