fn main() {
    #[cfg(feature = "cli")]
    pkgdelta::cli::run();

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("pkgdelta: CLI not enabled. Rebuild with `--features cli`.");
        std::process::exit(1);
    }
}
