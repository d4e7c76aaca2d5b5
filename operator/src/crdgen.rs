use controller::{Catalogue, CatalogueItem, LandingPage, Result};
use kube::CustomResourceExt;

fn main() -> Result<()> {
    for crd in [LandingPage::crd(), Catalogue::crd(), CatalogueItem::crd()] {
        println!("---");
        print!(
            "{}",
            serde_yaml::to_string(&crd).map_err(|e| controller::Error::Other(e.to_string()))?
        );
    }
    Ok(())
}
