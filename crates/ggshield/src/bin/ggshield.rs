fn main() {
    std::process::exit(ggshield::run());
}
