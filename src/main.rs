#[actix_web::main]
async fn main() -> std::io::Result<()> {
    agency_quote_server::run().await
}
