//! Declarative per-entity mapping registry.
//!
//! Each entity type is described once: where it lives remotely, which field
//! is its natural key, and how remote fields project onto table columns. The
//! orchestrator is generic over these descriptors.

use pickmirror_common::entity::EntityType;
use pickmirror_common::schema::{ColumnSpec, ValueType};
use pickmirror_db::entity::models::TableSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldMapping {
    /// Dotted path into the remote record, e.g. `picker.name`.
    pub remote_path: &'static str,
    pub column: &'static str,
    pub value_type: ValueType,
    pub required: bool,
}

const fn optional(remote_path: &'static str, column: &'static str, value_type: ValueType) -> FieldMapping {
    FieldMapping {
        remote_path,
        column,
        value_type,
        required: false,
    }
}

const fn required(remote_path: &'static str, column: &'static str, value_type: ValueType) -> FieldMapping {
    FieldMapping {
        remote_path,
        column,
        value_type,
        required: true,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaDescriptor {
    pub entity_type: EntityType,
    pub table: &'static str,
    /// Path relative to the API base URL.
    pub endpoint: &'static str,
    pub key_path: &'static str,
    pub key_column: &'static str,
    /// Query parameter accepting a lower-bound timestamp, if the endpoint has one.
    pub since_param: Option<&'static str>,
    pub fields: &'static [FieldMapping],
}

impl SchemaDescriptor {
    pub fn table_spec(&self) -> TableSpec {
        TableSpec {
            name: self.table.to_string(),
            key_column: self.key_column.to_string(),
            columns: self
                .fields
                .iter()
                .map(|f| ColumnSpec::new(f.column, f.value_type))
                .collect(),
        }
    }
}

use ValueType::{Boolean, DateTime, Float, Integer, String as Text};

const PRODUCT_FIELDS: &[FieldMapping] = &[
    required("productcode", "productcode", Text),
    required("name", "name", Text),
    optional("price", "price", Float),
    optional("fixedstockprice", "fixed_stock_price", Float),
    optional("idsupplier", "idsupplier", Integer),
    optional("productcode_supplier", "productcode_supplier", Text),
    optional("barcode", "barcode", Text),
    optional("weight", "weight", Integer),
    optional("type", "product_type", Text),
    optional("active", "active", Boolean),
    optional("created", "remote_created_at", DateTime),
    optional("updated", "remote_updated_at", DateTime),
];

const PICKLIST_FIELDS: &[FieldMapping] = &[
    required("picklistid", "picklistid", Text),
    optional("idorder", "idorder", Integer),
    optional("idwarehouse", "idwarehouse", Integer),
    optional("status", "status", Text),
    optional("deliveryname", "delivery_name", Text),
    optional("totalproducts", "total_products", Integer),
    optional("totalpicked", "total_picked", Integer),
    optional("urgent", "urgent", Boolean),
    optional("picker.name", "picked_by_name", Text),
    optional("closed_by.name", "closed_by_name", Text),
    optional("closed_at", "closed_at", DateTime),
    optional("created", "remote_created_at", DateTime),
    optional("updated", "remote_updated_at", DateTime),
];

const WAREHOUSE_FIELDS: &[FieldMapping] = &[
    required("name", "name", Text),
    optional("accept_orders", "accept_orders", Boolean),
    optional("counts_for_general_stock", "counts_for_general_stock", Boolean),
    optional("priority", "priority", Integer),
    optional("active", "active", Boolean),
];

const USER_FIELDS: &[FieldMapping] = &[
    required("username", "username", Text),
    optional("firstname", "first_name", Text),
    optional("lastname", "last_name", Text),
    optional("emailaddress", "email_address", Text),
    optional("language", "language", Text),
    optional("admin", "admin", Boolean),
    optional("active", "active", Boolean),
    optional("last_login_at", "last_login_at", DateTime),
    optional("created_at", "remote_created_at", DateTime),
    optional("updated_at", "remote_updated_at", DateTime),
];

const SUPPLIER_FIELDS: &[FieldMapping] = &[
    required("name", "name", Text),
    optional("contactname", "contact_name", Text),
    optional("telephone", "telephone", Text),
    optional("emailaddress", "email_address", Text),
    optional("language", "language", Text),
    optional("remarks", "remarks", Text),
    optional("address.city", "city", Text),
    optional("address.country", "country", Text),
];

const BATCH_FIELDS: &[FieldMapping] = &[
    required("picklist_batchid", "picklist_batchid", Text),
    optional("type", "batch_type", Text),
    optional("status", "status", Text),
    optional("idwarehouse", "idwarehouse", Integer),
    optional("assigned_to.full_name", "assigned_to_name", Text),
    optional("completed_by.full_name", "completed_by_name", Text),
    optional("total_products", "total_products", Integer),
    optional("total_picklists", "total_picklists", Integer),
    optional("completed_at", "completed_at", DateTime),
    optional("created_at", "remote_created_at", DateTime),
    optional("updated_at", "remote_updated_at", DateTime),
];

static DESCRIPTORS: [SchemaDescriptor; 6] = [
    SchemaDescriptor {
        entity_type: EntityType::Products,
        table: "products",
        endpoint: "products",
        key_path: "idproduct",
        key_column: "idproduct",
        since_param: Some("updated_after"),
        fields: PRODUCT_FIELDS,
    },
    SchemaDescriptor {
        entity_type: EntityType::Picklists,
        table: "picklists",
        endpoint: "picklists",
        key_path: "idpicklist",
        key_column: "idpicklist",
        since_param: Some("updated_after"),
        fields: PICKLIST_FIELDS,
    },
    SchemaDescriptor {
        entity_type: EntityType::Warehouses,
        table: "warehouses",
        endpoint: "warehouses",
        key_path: "idwarehouse",
        key_column: "idwarehouse",
        since_param: None,
        fields: WAREHOUSE_FIELDS,
    },
    SchemaDescriptor {
        entity_type: EntityType::Users,
        table: "users",
        endpoint: "users",
        key_path: "iduser",
        key_column: "iduser",
        since_param: None,
        fields: USER_FIELDS,
    },
    SchemaDescriptor {
        entity_type: EntityType::Suppliers,
        table: "suppliers",
        endpoint: "suppliers",
        key_path: "idsupplier",
        key_column: "idsupplier",
        since_param: None,
        fields: SUPPLIER_FIELDS,
    },
    SchemaDescriptor {
        entity_type: EntityType::Batches,
        table: "batches",
        endpoint: "picklists/batches",
        key_path: "idpicklist_batch",
        key_column: "idpicklist_batch",
        since_param: None,
        fields: BATCH_FIELDS,
    },
];

pub fn descriptor_for(entity_type: EntityType) -> &'static SchemaDescriptor {
    let index = match entity_type {
        EntityType::Products => 0,
        EntityType::Picklists => 1,
        EntityType::Warehouses => 2,
        EntityType::Users => 3,
        EntityType::Suppliers => 4,
        EntityType::Batches => 5,
    };
    &DESCRIPTORS[index]
}

pub fn all_descriptors() -> &'static [SchemaDescriptor] {
    &DESCRIPTORS
}
