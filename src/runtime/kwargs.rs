use crate::value::{Exception, KwArgs, Value};

/// Merge keyword maps left to right, as a call with several `**` expansions would.
pub fn merge_keywords<I>(maps: I) -> Result<KwArgs, Exception>
where
    I: IntoIterator<Item = KwArgs>,
{
    let mut out = KwArgs::new();
    for map in maps {
        for (key, value) in map {
            if out.contains_key(&key) {
                return Err(duplicate_keyword(&key));
            }
            out.insert(key, value);
        }
    }
    Ok(out)
}

/// Convert a `**mapping` operand into keyword arguments.
pub fn keywords_from_mapping(mapping: &Value) -> Result<KwArgs, Exception> {
    let Value::Dict(dict) = mapping else {
        return Err(Exception::type_error(format!(
            "argument after ** must be a mapping, not {}",
            mapping.type_name()
        )));
    };
    dict.borrow()
        .iter()
        .map(|(k, v)| match k.as_str() {
            Some(name) => Ok((name.to_string(), v.clone())),
            None => Err(Exception::type_error("keywords must be strings")),
        })
        .collect()
}

pub fn duplicate_keyword(key: &str) -> Exception {
    Exception::type_error(format!("multiple values for keyword argument '{key}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kw(pairs: &[(&str, i64)]) -> KwArgs {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Value::Int(*v)))
            .collect()
    }

    #[test]
    fn merges_in_order() {
        let merged = merge_keywords([kw(&[("a", 1)]), kw(&[("b", 2), ("c", 3)])]).unwrap();
        assert_eq!(merged.keys().collect::<Vec<_>>(), vec!["a", "b", "c"]);
    }

    #[test]
    fn duplicate_key_is_type_error() {
        let err = merge_keywords([kw(&[("a", 1)]), kw(&[("a", 2)])]).unwrap_err();
        assert_eq!(err.class_name, "TypeError");
        assert_eq!(err.message, "multiple values for keyword argument 'a'");
    }

    #[test]
    fn mapping_keys_must_be_strings() {
        let bad = Value::dict([(Value::Int(1), Value::None)]);
        assert!(keywords_from_mapping(&bad).is_err());
        assert!(keywords_from_mapping(&Value::Int(3)).is_err());
        let good = Value::dict([(Value::str("x"), Value::Int(1))]);
        assert_eq!(keywords_from_mapping(&good).unwrap().len(), 1);
    }
}
