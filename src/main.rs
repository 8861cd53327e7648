fn main() {
    bracket_auction_lib::run()
}
