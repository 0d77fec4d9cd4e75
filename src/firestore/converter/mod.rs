mod model_converter;
mod plain;
mod settings;

pub use model_converter::{decode_date, FirestoreModelConverter, ModeAware, SafeDecode};
pub use plain::{ConverterNode, EncodeContext, FieldReader, ModelConverter};
pub use settings::{ConverterSettings, FunctionDateFormat, TransportMode};
