use crate::error::{PipelineError, Result};
use crate::features::FeatureSet;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Layout version written into new templates.
pub const TEMPLATE_VERSION: u32 = 1;

/// Text-column-safe encoding of one student's [`FeatureSet`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Template(String);

impl Template {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for Template {
    fn from(text: String) -> Self {
        Self(text)
    }
}

impl From<&str> for Template {
    fn from(text: &str) -> Self {
        Self(text.to_string())
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Serialize, Deserialize)]
struct TemplateBody {
    #[serde(default = "default_version")]
    version: u32,
    area: f64,
    perimeter: f64,
    circularity: f64,
}

fn default_version() -> u32 {
    TEMPLATE_VERSION
}

#[derive(Deserialize)]
struct LegacyFeature {
    area: f64,
    perimeter: f64,
    circularity: f64,
}

/// Multi-contour layout written by earlier reader versions. Its pixel hash is
/// never read back.
#[derive(Deserialize)]
struct LegacyBody {
    features: Vec<LegacyFeature>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredBody {
    Current(TemplateBody),
    Legacy(LegacyBody),
}

/// Converts feature sets to and from base64-wrapped JSON templates.
pub struct TemplateCodec;

impl TemplateCodec {
    /// Encode a feature set; non-finite or negative values are rejected so a
    /// stored template always decodes.
    pub fn encode(features: &FeatureSet) -> Result<Template> {
        if !features.is_valid() {
            return Err(PipelineError::InvalidInput(format!(
                "cannot encode out-of-range feature values: {features:?}"
            )));
        }
        let body = TemplateBody {
            version: TEMPLATE_VERSION,
            area: features.area,
            perimeter: features.perimeter,
            circularity: features.circularity,
        };
        let json = serde_json::to_string(&body)
            .map_err(|e| PipelineError::InvalidInput(format!("cannot serialize template: {e}")))?;
        Ok(Template(STANDARD.encode(json.as_bytes())))
    }

    pub fn decode(template: &str) -> Result<FeatureSet> {
        let bytes = STANDARD
            .decode(template.trim())
            .map_err(|e| PipelineError::MalformedTemplate(format!("invalid base64: {e}")))?;
        let json = std::str::from_utf8(&bytes)
            .map_err(|e| PipelineError::MalformedTemplate(format!("invalid utf-8: {e}")))?;
        let body: StoredBody = serde_json::from_str(json)
            .map_err(|e| PipelineError::MalformedTemplate(format!("invalid body: {e}")))?;

        let features = match body {
            StoredBody::Current(b) => FeatureSet::new(b.area, b.perimeter, b.circularity),
            StoredBody::Legacy(b) => Self::dominant_legacy_feature(&b.features)?,
        };

        if !features.is_valid() {
            return Err(PipelineError::MalformedTemplate(format!(
                "out-of-range feature values: {features:?}"
            )));
        }
        Ok(features)
    }

    fn dominant_legacy_feature(features: &[LegacyFeature]) -> Result<FeatureSet> {
        let mut best: Option<&LegacyFeature> = None;
        for f in features {
            match best {
                Some(b) if f.area <= b.area => {}
                _ => best = Some(f),
            }
        }
        best.map(|f| FeatureSet::new(f.area, f.perimeter, f.circularity))
            .ok_or_else(|| {
                PipelineError::MalformedTemplate("legacy template has no features".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap(json: &str) -> String {
        STANDARD.encode(json.as_bytes())
    }

    fn assert_malformed(text: &str) {
        match TemplateCodec::decode(text) {
            Err(PipelineError::MalformedTemplate(_)) => {}
            other => panic!("expected MalformedTemplate, got {other:?}"),
        }
    }

    #[test]
    fn decode_reproduces_encoded_features() {
        for f in [
            FeatureSet::new(1500.0, 140.0, 0.96),
            FeatureSet::from_shape(0.1 + 0.2, 1.0 / 3.0),
            FeatureSet::new(0.0, 0.0, 0.0),
            FeatureSet::new(1.0e-300, 7.25e12, 0.999_999_999_9),
        ] {
            let template = TemplateCodec::encode(&f).unwrap();
            assert_eq!(TemplateCodec::decode(template.as_str()).unwrap(), f);
        }
    }

    #[test]
    fn computed_shapes_survive_encoding_bit_for_bit() {
        for i in 0..2000 {
            let i = i as f64;
            let f = FeatureSet::from_shape(i * 3.5 + 0.5, i.sqrt() * 7.3 + 1.0);
            let template = TemplateCodec::encode(&f).unwrap();
            let decoded = TemplateCodec::decode(template.as_str()).unwrap();
            assert_eq!(decoded.area.to_bits(), f.area.to_bits(), "area of {f:?}");
            assert_eq!(decoded.perimeter.to_bits(), f.perimeter.to_bits(), "perimeter of {f:?}");
            assert_eq!(
                decoded.circularity.to_bits(),
                f.circularity.to_bits(),
                "circularity of {f:?}"
            );
        }
    }

    #[test]
    fn invalid_features_are_not_encoded() {
        for f in [
            FeatureSet::new(f64::NAN, 10.0, 0.5),
            FeatureSet::new(10.0, f64::INFINITY, 0.5),
            FeatureSet::new(-1.0, 10.0, 0.5),
        ] {
            assert!(matches!(
                TemplateCodec::encode(&f),
                Err(PipelineError::InvalidInput(_))
            ));
        }
    }

    #[test]
    fn encoded_template_holds_only_shape_scalars() {
        let template = TemplateCodec::encode(&FeatureSet::new(10.0, 12.0, 0.87)).unwrap();
        let bytes = STANDARD.decode(template.as_str()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let mut keys: Vec<&str> = value
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["area", "circularity", "perimeter", "version"]);
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let text = wrap(r#"{"version":2,"area":5.0,"perimeter":9.0,"circularity":0.5,"ridge_count":14}"#);
        assert_eq!(
            TemplateCodec::decode(&text).unwrap(),
            FeatureSet::new(5.0, 9.0, 0.5)
        );
    }

    #[test]
    fn legacy_layout_uses_largest_feature() {
        let text = wrap(
            r#"{"features":[
                {"area":120.0,"perimeter":50.0,"circularity":0.6},
                {"area":900.0,"perimeter":110.0,"circularity":0.93},
                {"area":900.0,"perimeter":140.0,"circularity":0.58}
            ],"image_hash":"9e107d9d372bb6826bd81d3542a419d6"}"#,
        );
        assert_eq!(
            TemplateCodec::decode(&text).unwrap(),
            FeatureSet::new(900.0, 110.0, 0.93)
        );
    }

    #[test]
    fn legacy_layout_without_features_is_malformed() {
        assert_malformed(&wrap(r#"{"features":[],"image_hash":"00"}"#));
    }

    #[test]
    fn malformed_inputs_are_rejected() {
        assert_malformed("not base64 at all!");
        assert_malformed(&STANDARD.encode([0xff, 0xfe, 0x00]));
        assert_malformed(&wrap("[1, 2, 3]"));
        assert_malformed(&wrap(r#"{"area":1.0,"perimeter":2.0}"#));
        assert_malformed(&wrap(r#"{"area":"big","perimeter":2.0,"circularity":0.1}"#));
        assert_malformed(&wrap(r#"{"area":-4.0,"perimeter":2.0,"circularity":0.1}"#));
        assert_malformed("");
    }

    #[test]
    fn surrounding_whitespace_is_tolerated() {
        let f = FeatureSet::new(3.0, 4.0, 0.2);
        let padded = format!("  {}\n", TemplateCodec::encode(&f).unwrap());
        assert_eq!(TemplateCodec::decode(&padded).unwrap(), f);
    }
}
