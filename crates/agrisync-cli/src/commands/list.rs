use agrisync_core::models::{Activity, Collection, Crop, Livestock, Record, Transaction};
use agrisync_core::FarmService;

use crate::commands::common::{
    format_activity_lines, format_crop_lines, format_livestock_lines, format_market_price_lines,
    format_transaction_lines, format_weather_line,
};
use crate::error::CliError;
use crate::remote::CliRemote;

pub async fn run_list(
    service: &FarmService<CliRemote>,
    collection: &str,
    as_json: bool,
) -> Result<(), CliError> {
    match collection.parse::<Collection>()? {
        Collection::Crops => {
            let crops = service.list::<Crop>().await?;
            print_items(&crops, as_json, format_crop_lines)
        }
        Collection::Livestock => {
            let livestock = service.list::<Livestock>().await?;
            print_items(&livestock, as_json, format_livestock_lines)
        }
        Collection::Activities => {
            let activities = service.list::<Activity>().await?;
            print_items(&activities, as_json, format_activity_lines)
        }
        Collection::Transactions => {
            let transactions = service.list::<Transaction>().await?;
            print_items(&transactions, as_json, format_transaction_lines)
        }
        Collection::MarketPrices => {
            let prices = service.market_prices().await?;
            print_items(&prices, as_json, format_market_price_lines)
        }
        Collection::Weather => {
            let weather = service.weather().await?;
            if as_json {
                println!("{}", serde_json::to_string_pretty(&weather)?);
            } else if let Some(weather) = weather {
                println!("{}", format_weather_line(&weather));
            } else {
                println!("No weather data yet. Run `agrisync sync` while online.");
            }
            Ok(())
        }
    }
}

fn print_items<T: Record>(
    items: &[T],
    as_json: bool,
    format_lines: fn(&[T]) -> Vec<String>,
) -> Result<(), CliError> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(items)?);
        return Ok(());
    }

    if items.is_empty() {
        println!("No {} recorded.", T::COLLECTION);
        return Ok(());
    }

    for line in format_lines(items) {
        println!("{line}");
    }
    Ok(())
}
