mod codec;

pub use codec::{Template, TemplateCodec, TEMPLATE_VERSION};
