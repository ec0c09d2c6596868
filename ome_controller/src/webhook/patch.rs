//! RFC 6902 JSON patch generation.
//!
//! Admission responses carry the difference between the submitted object and
//! the mutated one as a patch. The diff recurses through objects, patches
//! same-length arrays element-wise and replaces arrays whose length changed;
//! the output is deterministic for a given input pair.

use serde_json::Value;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PatchOp {
    pub op: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// JSON pointer token escaping: `~` then `/`.
fn escape(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

pub fn diff(original: &Value, mutated: &Value) -> Vec<PatchOp> {
    let mut ops = Vec::new();
    diff_into("", original, mutated, &mut ops);
    ops
}

fn diff_into(path: &str, original: &Value, mutated: &Value, ops: &mut Vec<PatchOp>) {
    if original == mutated {
        return;
    }
    match (original, mutated) {
        (Value::Object(a), Value::Object(b)) => {
            for (key, value) in a {
                if !b.contains_key(key) {
                    ops.push(PatchOp {
                        op: "remove".to_string(),
                        path: format!("{}/{}", path, escape(key)),
                        value: None,
                    });
                } else {
                    diff_into(&format!("{}/{}", path, escape(key)), value, &b[key], ops);
                }
            }
            for (key, value) in b {
                if !a.contains_key(key) {
                    ops.push(PatchOp {
                        op: "add".to_string(),
                        path: format!("{}/{}", path, escape(key)),
                        value: Some(value.clone()),
                    });
                }
            }
        }
        (Value::Array(a), Value::Array(b)) if a.len() == b.len() => {
            for (i, (va, vb)) in a.iter().zip(b.iter()).enumerate() {
                diff_into(&format!("{}/{}", path, i), va, vb, ops);
            }
        }
        _ => {
            ops.push(PatchOp {
                op: "replace".to_string(),
                path: path.to_string(),
                value: Some(mutated.clone()),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal applier used to check the patches round-trip.
    fn apply(doc: &mut Value, ops: &[PatchOp]) {
        for op in ops {
            let mut tokens: Vec<String> = op
                .path
                .split('/')
                .skip(1)
                .map(|t| t.replace("~1", "/").replace("~0", "~"))
                .collect();
            let last = tokens.pop().unwrap();
            let mut target = &mut *doc;
            for token in &tokens {
                target = match target {
                    Value::Object(m) => m.get_mut(token).unwrap(),
                    Value::Array(v) => v.get_mut(token.parse::<usize>().unwrap()).unwrap(),
                    _ => panic!("bad path {}", op.path),
                };
            }
            match (op.op.as_str(), target) {
                ("remove", Value::Object(m)) => {
                    m.remove(&last);
                }
                ("add", Value::Object(m)) | ("replace", Value::Object(m)) => {
                    m.insert(last, op.value.clone().unwrap());
                }
                ("replace", Value::Array(v)) => {
                    v[last.parse::<usize>().unwrap()] = op.value.clone().unwrap();
                }
                other => panic!("unsupported op {:?}", other.0),
            }
        }
    }

    #[test]
    fn identical_documents_produce_no_ops() {
        let doc = json!({"a": 1, "b": [1, 2]});
        assert!(diff(&doc, &doc).is_empty());
    }

    #[test]
    fn diff_round_trips() {
        let original = json!({
            "metadata": {"name": "pod", "labels": {"keep": "yes", "drop": "x"}},
            "spec": {"containers": [{"name": "c", "env": []}]}
        });
        let mutated = json!({
            "metadata": {"name": "pod", "labels": {"keep": "yes"}, "annotations": {"added": "1"}},
            "spec": {"containers": [{"name": "c", "env": [{"name": "A", "value": "1"}]}]}
        });
        let ops = diff(&original, &mutated);
        let mut patched = original.clone();
        apply(&mut patched, &ops);
        assert_eq!(patched, mutated);
    }

    #[test]
    fn array_growth_is_a_whole_replace() {
        let original = json!({"list": [1]});
        let mutated = json!({"list": [1, 2]});
        let ops = diff(&original, &mutated);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].op, "replace");
        assert_eq!(ops[0].path, "/list");
    }

    #[test]
    fn escapes_pointer_tokens() {
        let original = json!({"metadata": {"annotations": {}}});
        let mutated = json!({"metadata": {"annotations": {"ome.io/inject-model-init": "true"}}});
        let ops = diff(&original, &mutated);
        assert_eq!(ops[0].path, "/metadata/annotations/ome.io~1inject-model-init");
    }
}
