use agrisync_core::models::{Activity, Collection, Crop, Livestock, RecordKey, Transaction};
use agrisync_core::FarmService;

use crate::error::CliError;
use crate::remote::CliRemote;

pub async fn run_delete(
    service: &FarmService<CliRemote>,
    collection: &str,
    id: &str,
) -> Result<(), CliError> {
    let collection = collection.parse::<Collection>()?;
    let key = RecordKey::parse(id);
    let removed = match collection {
        Collection::Crops => service.delete::<Crop>(key).await?,
        Collection::Livestock => service.delete::<Livestock>(key).await?,
        Collection::Activities => service.delete::<Activity>(key).await?,
        Collection::Transactions => service.delete::<Transaction>(key).await?,
        Collection::MarketPrices | Collection::Weather => {
            return Err(CliError::ReadOnlyCollection(collection.to_string()));
        }
    };

    if !removed {
        return Err(CliError::NotFound(format!("{collection} {id}")));
    }
    println!("Deleted {collection} {id} (local only)");
    Ok(())
}
