//! Common test utilities and harness for Tessera engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use tessera_core::{Document, DomainType, EngineConfig, FieldSpec, IndexDeclaration, Suggester};
use tessera_engine::SearchEngine;
use tessera_memory::InMemoryIndexService;
use uuid::Uuid;

/// Test harness for integration tests.
///
/// Each harness owns a fresh in-memory service and a uniquely named index.
pub struct TestHarness {
    /// In-memory service, kept for fault injection and call counters
    pub service: Arc<InMemoryIndexService>,
    /// Facade under test
    pub engine: SearchEngine,
    /// Index name for this test
    pub index: String,
}

impl TestHarness {
    /// Creates a harness with the default transport page size.
    pub fn new() -> Self {
        Self::with_service(InMemoryIndexService::new(), EngineConfig::default())
    }

    /// Creates a harness whose service pages results `page_size` at a time.
    pub fn with_page_size(page_size: usize) -> Self {
        Self::with_service(
            InMemoryIndexService::new().with_page_size(page_size),
            EngineConfig::default(),
        )
    }

    /// Creates a harness with a custom engine configuration.
    pub fn with_config(config: EngineConfig) -> Self {
        Self::with_service(InMemoryIndexService::new(), config)
    }

    fn with_service(service: InMemoryIndexService, config: EngineConfig) -> Self {
        let service = Arc::new(service);
        let engine = SearchEngine::new(service.clone(), config).expect("valid engine config");
        Self {
            service,
            engine,
            index: format!("products-{}", Uuid::new_v4().simple()),
        }
    }

    /// The product declaration for this harness's index.
    pub fn declaration(&self) -> IndexDeclaration {
        product_declaration(&self.index)
    }

    /// Creates the product index and uploads the product fixtures.
    pub async fn seed(&self) {
        self.engine
            .upsert_batch(&self.declaration(), products())
            .await
            .expect("seeding products");
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Product index: a key, three text fields, and a numeric cost.
pub fn product_declaration(index: &str) -> IndexDeclaration {
    IndexDeclaration::new(index)
        .field(FieldSpec::new("RowKey", DomainType::String).key())
        .field(
            FieldSpec::new("Brand", DomainType::String)
                .searchable()
                .filterable()
                .sortable()
                .facetable(),
        )
        .field(
            FieldSpec::new("ProductName", DomainType::String)
                .searchable()
                .filterable()
                .sortable(),
        )
        .field(
            FieldSpec::new("Sku", DomainType::String)
                .searchable()
                .filterable()
                .sortable(),
        )
        .field(
            FieldSpec::new("Cost", DomainType::Float64)
                .filterable()
                .sortable()
                .facetable(),
        )
        .suggester(Suggester::new("sg", ["RowKey", "ProductName"]))
}

/// One product document.
pub fn product(key: &str, brand: &str, name: &str, sku: &str, cost: f64) -> Document {
    Document::new()
        .with("RowKey", key)
        .with("Brand", brand)
        .with("ProductName", name)
        .with("Sku", sku)
        .with("Cost", cost)
}

/// Eight products over three brands: Coke x4, Pepsi x3, NeHi x1.
pub fn products() -> Vec<Document> {
    vec![
        product("1", "Coke", "Coke Classic", "123456", 100.0),
        product("2", "Coke", "Sprite", "123457", 100.0),
        product("3", "Coke", "Diet Coke", "123458", 201.0),
        product("4", "Coke", "Mello Yellow", "123459", 100.0),
        product("5", "Pepsi", "Pepsi", "223450", 200.0),
        product("6", "Pepsi", "Diet Pepsi", "223451", 210.0),
        product("7", "Pepsi", "Pepsi Clear", "223452", 190.0),
        product("8", "NeHi", "Grape", "323450", 300.0),
    ]
}

/// Keys of a set of documents, sorted.
pub fn keys_of(documents: &[Document]) -> Vec<String> {
    let mut keys: Vec<String> = documents
        .iter()
        .filter_map(|doc| doc.key("RowKey"))
        .collect();
    keys.sort();
    keys
}
