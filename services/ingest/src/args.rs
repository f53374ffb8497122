use pickmirror_common::entity::EntityType;

/// `pickmirror-ingest [entity_type] [--full]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestArgs {
    /// `None` syncs every entity type.
    pub entity: Option<EntityType>,
    pub full: bool,
}

pub fn parse_args<I>(args: I) -> Result<IngestArgs, String>
where
    I: IntoIterator<Item = String>,
{
    let mut entity = None;
    let mut full = false;

    for arg in args {
        match arg.as_str() {
            "--full" => full = true,
            flag if flag.starts_with('-') => return Err(format!("unknown flag: {flag}")),
            name => {
                if entity.is_some() {
                    return Err(format!("unexpected argument: {name}"));
                }
                entity = Some(name.parse::<EntityType>().map_err(|e| e.to_string())?);
            }
        }
    }

    Ok(IngestArgs { entity, full })
}
