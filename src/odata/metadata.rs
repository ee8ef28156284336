//! EDMX `$metadata` parsing and the field dictionary built from it

use crate::auth::CredentialChain;
use crate::odata::client::ODataClient;
use crate::report::{CellValue, Sheet, Workbook};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Sheet name of the intermediate dictionary artifact
pub const DICTIONARY_SHEET: &str = "Simple EC Data API Dictionary";

const DICTIONARY_COLUMNS: [&str; 15] = [
    "Entity",
    "Name",
    "label",
    "Type",
    "Key",
    "required",
    "picklist",
    "MaxLength",
    "NavigationField",
    "creatable",
    "updatable",
    "visible",
    "filterable",
    "sortable",
    "upsertable",
];

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Malformed metadata XML at byte {position}: {message}")]
    Xml { position: u64, message: String },
}

/// One schema field of an entity type
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldAttribute {
    pub entity: String,
    pub name: String,
    pub data_type: Option<String>,
    pub max_length: Option<String>,
    pub label: Option<String>,
    pub key: bool,
    pub required: Option<bool>,
    pub creatable: Option<bool>,
    pub updatable: Option<bool>,
    pub upsertable: Option<bool>,
    pub visible: Option<bool>,
    pub filterable: Option<bool>,
    pub sortable: Option<bool>,
    /// Picklist id; present for dropdown fields
    pub picklist: Option<String>,
    /// Relationship to another entity, not a scalar value
    pub navigation: bool,
}

impl FieldAttribute {
    pub fn is_picklist(&self) -> bool {
        self.picklist.is_some()
    }

    fn from_attributes(entity: &str, attrs: &HashMap<String, String>, navigation: bool) -> Option<Self> {
        let text = |key: &str| attrs.get(key).filter(|v| !v.is_empty()).cloned();
        let flag = |key: &str| attrs.get(key).and_then(|v| parse_flag(v));

        Some(Self {
            entity: entity.to_string(),
            name: text("Name")?,
            data_type: text("Type"),
            max_length: text("MaxLength"),
            label: text("label"),
            key: false,
            required: flag("required"),
            creatable: flag("creatable"),
            updatable: flag("updatable"),
            upsertable: flag("upsertable"),
            visible: flag("visible"),
            filterable: flag("filterable"),
            sortable: flag("sortable"),
            picklist: text("picklist"),
            navigation,
        })
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn flag_text(value: Option<bool>) -> String {
    value.map(|b| b.to_string()).unwrap_or_default()
}

/// Collect attributes by local name, so `sap:label` is stored as `label`
fn attributes(element: &BytesStart<'_>, position: u64) -> Result<HashMap<String, String>, MetadataError> {
    let mut map = HashMap::new();
    for attr in element.attributes() {
        let attr = attr.map_err(|e| MetadataError::Xml {
            position,
            message: e.to_string(),
        })?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr.unescape_value().map_err(|e| MetadataError::Xml {
            position,
            message: e.to_string(),
        })?;
        map.insert(key, value.into_owned());
    }
    Ok(map)
}

#[derive(Debug)]
struct EntityTypeBuilder {
    name: String,
    keys: Vec<String>,
    fields: Vec<FieldAttribute>,
}

impl EntityTypeBuilder {
    fn finish(self) -> Vec<FieldAttribute> {
        let keys = self.keys;
        self.fields
            .into_iter()
            .map(|mut field| {
                field.key = !field.navigation && keys.iter().any(|k| *k == field.name);
                field
            })
            .collect()
    }
}

/// Parse the fields of `entity` from an EDMX document
///
/// Only `Schema` elements with the given namespace are searched when
/// `namespace` is set. Entity type names are matched case-insensitively.
pub fn parse_metadata(
    xml: &str,
    entity: &str,
    namespace: Option<&str>,
) -> Result<Vec<FieldAttribute>, MetadataError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut fields = Vec::new();
    let mut in_schema = false;
    let mut in_key = false;
    let mut current: Option<EntityTypeBuilder> = None;

    loop {
        let position = reader.buffer_position() as u64;
        let (element, is_empty) = match reader.read_event() {
            Ok(Event::Start(e)) => (e, false),
            Ok(Event::Empty(e)) => (e, true),
            Ok(Event::End(e)) => {
                match e.local_name().as_ref() {
                    b"Schema" => in_schema = false,
                    b"Key" => in_key = false,
                    b"EntityType" => {
                        if let Some(builder) = current.take() {
                            fields.extend(builder.finish());
                        }
                    }
                    _ => {}
                }
                continue;
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(MetadataError::Xml {
                    position,
                    message: e.to_string(),
                })
            }
            Ok(_) => continue,
        };

        match element.local_name().as_ref() {
            b"Schema" if !is_empty => {
                let attrs = attributes(&element, position)?;
                in_schema = match namespace {
                    Some(ns) => attrs.get("Namespace").map(String::as_str) == Some(ns),
                    None => true,
                };
            }
            b"EntityType" if in_schema && !is_empty => {
                let attrs = attributes(&element, position)?;
                if let Some(name) = attrs.get("Name").filter(|n| n.eq_ignore_ascii_case(entity)) {
                    current = Some(EntityTypeBuilder {
                        name: name.clone(),
                        keys: Vec::new(),
                        fields: Vec::new(),
                    });
                }
            }
            b"Key" if !is_empty => in_key = true,
            b"PropertyRef" if in_key => {
                if let Some(builder) = current.as_mut() {
                    if let Some(name) = attributes(&element, position)?.remove("Name") {
                        builder.keys.push(name);
                    }
                }
            }
            tag @ (b"Property" | b"NavigationProperty") => {
                if let Some(builder) = current.as_mut() {
                    let navigation = tag == b"NavigationProperty";
                    let attrs = attributes(&element, position)?;
                    if let Some(field) = FieldAttribute::from_attributes(&builder.name, &attrs, navigation) {
                        builder.fields.push(field);
                    }
                }
            }
            _ => {}
        }
    }

    Ok(fields)
}

/// Field attributes of every processed entity
#[derive(Debug, Clone, Default)]
pub struct SchemaDictionary {
    entities: BTreeMap<String, Vec<FieldAttribute>>,
}

impl SchemaDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add fields of one entity; duplicate names (case-insensitive) keep the first
    pub fn insert_fields(&mut self, fields: Vec<FieldAttribute>) {
        for field in fields {
            let entity_key = self
                .entities
                .keys()
                .find(|k| k.eq_ignore_ascii_case(&field.entity))
                .cloned()
                .unwrap_or_else(|| field.entity.clone());
            let entry = self.entities.entry(entity_key).or_default();
            if !entry.iter().any(|f| f.name.eq_ignore_ascii_case(&field.name)) {
                entry.push(field);
            }
        }
        for fields in self.entities.values_mut() {
            fields.sort_by(|a, b| {
                a.name
                    .cmp(&b.name)
                    .then(b.key.cmp(&a.key))
                    .then(b.required.unwrap_or(false).cmp(&a.required.unwrap_or(false)))
            });
        }
    }

    pub fn fields(&self, entity: &str) -> &[FieldAttribute] {
        self.entities
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(entity))
            .map(|(_, fields)| fields.as_slice())
            .unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldAttribute> {
        self.entities.values().flatten()
    }

    pub fn len(&self) -> usize {
        self.entities.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Case-insensitive lookup within `entity`, falling back to any entity
    pub fn lookup(&self, entity: Option<&str>, name: &str) -> Option<&FieldAttribute> {
        let in_entity = entity.and_then(|entity| {
            self.fields(entity)
                .iter()
                .find(|f| f.name.eq_ignore_ascii_case(name))
        });
        in_entity.or_else(|| self.iter().find(|f| f.name.eq_ignore_ascii_case(name)))
    }

    /// Render as the single-sheet dictionary artifact
    pub fn to_workbook(&self) -> Workbook {
        let mut sheet = Sheet::new(DICTIONARY_SHEET);
        sheet.push_row(DICTIONARY_COLUMNS.iter().map(|c| CellValue::from(*c)).collect());
        for field in self.iter() {
            let row = [
                field.entity.clone(),
                field.name.clone(),
                field.label.clone().unwrap_or_default(),
                field.data_type.clone().unwrap_or_default(),
                field.key.to_string(),
                flag_text(field.required),
                field.picklist.clone().unwrap_or_default(),
                field.max_length.clone().unwrap_or_default(),
                field.navigation.to_string(),
                flag_text(field.creatable),
                flag_text(field.updatable),
                flag_text(field.visible),
                flag_text(field.filterable),
                flag_text(field.sortable),
                flag_text(field.upsertable),
            ];
            sheet.push_row(row.into_iter().map(CellValue::from).collect());
        }

        let mut workbook = Workbook::new();
        workbook.upsert_sheet(sheet);
        workbook
    }
}

/// Download and parse `$metadata` for each entity
///
/// Failures are logged and the entity is skipped.
pub async fn extract_schema(
    client: &ODataClient,
    entities: &[String],
    credentials: &CredentialChain,
    namespace: Option<&str>,
) -> SchemaDictionary {
    tracing::info!("Extracting OData API dictionary for {} entities", entities.len());
    let mut dictionary = SchemaDictionary::new();

    for entity in entities {
        tracing::info!("Fetching metadata for {}...", entity);
        let xml = match client.fetch_metadata(entity, credentials).await {
            Ok(xml) => xml,
            Err(e) => {
                tracing::warn!("Failed to fetch metadata for {}: {}", entity, e);
                continue;
            }
        };

        match parse_metadata(&xml, entity, namespace) {
            Ok(fields) if fields.is_empty() => {
                tracing::warn!("Entity type {} not found in metadata", entity);
            }
            Ok(fields) => {
                tracing::debug!("Parsed {} fields for {}", fields.len(), entity);
                dictionary.insert_fields(fields);
            }
            Err(e) => tracing::warn!("Failed to parse metadata for {}: {}", entity, e),
        }
    }

    tracing::info!("Dictionary contains {} fields", dictionary.len());
    dictionary
}
