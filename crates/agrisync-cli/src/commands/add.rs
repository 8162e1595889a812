use agrisync_core::models::{
    Activity, Crop, Livestock, Record, Tracked, Transaction, TransactionKind,
};
use agrisync_core::{FarmService, Saved};

use crate::cli::{ActivityArgs, AddCommands, CropArgs, LivestockArgs, TransactionArgs};
use crate::error::CliError;
use crate::remote::CliRemote;

pub async fn run_add(
    service: &FarmService<CliRemote>,
    command: AddCommands,
) -> Result<(), CliError> {
    match command {
        AddCommands::Crop(args) => save(service, crop_from_args(args)).await,
        AddCommands::Livestock(args) => save(service, livestock_from_args(args)).await,
        AddCommands::Activity(args) => save(service, activity_from_args(args)).await,
        AddCommands::Transaction(args) => save(service, transaction_from_args(args)?).await,
    }
}

async fn save<T: Tracked>(service: &FarmService<CliRemote>, record: T) -> Result<(), CliError> {
    let saved = service.create_or_update(record).await?;
    for line in describe_saved(&saved) {
        println!("{line}");
    }
    Ok(())
}

pub fn describe_saved<T: Tracked>(saved: &Saved<T>) -> Vec<String> {
    let mut lines = vec![format!(
        "Saved {} {}",
        T::COLLECTION,
        saved.record.key()
    )];
    if let Some(error) = &saved.storage_error {
        lines.push(format!("Warning: not stored locally: {error}"));
    }
    match (&saved.queued, saved.reconciled) {
        (_, true) => lines.push("Synced with server".to_string()),
        (Some(entry), false) => lines.push(format!("Queued as #{} for the next sync", entry.id)),
        (None, false) => {}
    }
    lines
}

pub fn crop_from_args(args: CropArgs) -> Crop {
    let crop = Crop::new(args.name, args.area, args.plant_date, args.status, args.health);
    match args.id {
        Some(id) => crop.with_id(id),
        None => crop,
    }
}

pub fn livestock_from_args(args: LivestockArgs) -> Livestock {
    let livestock = Livestock::new(args.kind, args.count, args.last_checkup, args.health);
    match args.id {
        Some(id) => livestock.with_id(id),
        None => livestock,
    }
}

pub fn activity_from_args(args: ActivityArgs) -> Activity {
    let mut activity = Activity::new(args.date, args.description);
    if let Some(cost) = args.cost {
        activity = activity.with_cost(cost);
    }
    if let Some(income) = args.income {
        activity = activity.with_income(income);
    }
    match args.id {
        Some(id) => activity.with_id(id),
        None => activity,
    }
}

pub fn transaction_from_args(args: TransactionArgs) -> Result<Transaction, CliError> {
    let kind = args.kind.parse::<TransactionKind>()?;
    let mut transaction = Transaction::new(kind, args.amount, args.description, args.date);
    if let Some(method) = args.method {
        transaction = transaction.with_method(method);
    }
    if let Some(id) = args.id {
        transaction.id = id;
    }
    Ok(transaction)
}
