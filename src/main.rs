fn main() {
    if let Err(err) = csv_overwrite::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
