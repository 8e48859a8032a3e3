fn main() {
    mediagrid_lib::run()
}
