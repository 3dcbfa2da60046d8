fn main() {
    if let Err(err) = sheet_cruce::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
