mod app;
mod logging;

fn main() {
    let args = fs_cleaner::cli::parse();
    std::process::exit(app::run(args));
}
