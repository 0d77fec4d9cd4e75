use std::collections::BTreeMap;
use std::sync::Arc;

use jrx_firebase_client::firestore::*;

#[derive(Clone, Debug)]
struct Counter {
    label: String,
    value: i64,
}

struct CounterConverter;

impl ModelConverter for CounterConverter {
    type Model = Counter;

    fn to_plain(&self, model: &Counter, _ctx: &EncodeContext) -> FirestoreResult<WireRecord> {
        Ok(BTreeMap::from([
            ("label".to_string(), FirestoreValue::from_string(model.label.clone())),
            ("value".to_string(), FirestoreValue::from_integer(model.value)),
        ]))
    }

    fn to_model(&self, _id: &str, data: &WireRecord) -> FirestoreResult<Counter> {
        let reader = FieldReader::new(data);
        Ok(Counter {
            label: reader.string_or("label", "unnamed")?,
            value: reader.integer_or("value", 0)?,
        })
    }
}

struct CounterDoc {
    key: DocumentKey,
    converter: Arc<FirestoreModelConverter<CounterConverter>>,
}

impl DocumentSource for CounterDoc {
    type Model = Counter;

    fn reference(&self) -> DocumentKey {
        self.key.clone()
    }

    fn parse_data(&self, snapshot: &DocumentSnapshot) -> FirestoreResult<Counter> {
        self.converter.parse_snapshot(snapshot)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let store = InMemoryDatastore::new();
    let converter = Arc::new(FirestoreModelConverter::new(CounterConverter));
    let key = DocumentKey::from_string("counters/visits")?;
    let api = FirestoreDocApi::new(
        CounterDoc {
            key: key.clone(),
            converter: converter.clone(),
        },
        Arc::new(store.clone()),
    );

    let _watch = api
        .cur_data()
        .subscribe(|counter| println!("cell changed: {counter:?}"));
    api.start_stream_with(|counter| {
        if let Some(counter) = counter {
            println!("{} = {}", counter.label, counter.value);
        }
    })?;

    for value in 1..=3 {
        let counter = Counter {
            label: "visits".to_string(),
            value,
        };
        store.set_document(&key, converter.encode(&counter)?);
    }

    let fetched = futures::executor::block_on(api.fetch()).into_result()?;
    println!("fetched: {fetched:?}");
    api.stop_stream();
    Ok(())
}
