#[actix_web::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    vid_rs::run().await
}
