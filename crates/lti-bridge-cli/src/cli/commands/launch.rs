use super::{load_config, open_store};
use crate::cli::args::LaunchArgs;
use crate::exit_codes::SUCCESS;
use anyhow::Context;
use lti_bridge_core::{LaunchContext, LaunchDispatcher, RequestSession};
use serde_yaml::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Run setup and routing for a recorded launch, as if the upstream LTI layer
/// had just validated it, and print the resulting redirect.
pub fn run(config_path: &Path, args: LaunchArgs) -> anyhow::Result<i32> {
    let config = load_config(config_path)?;
    let params = read_params(&args.params)?;
    let store = open_store(&config)?;
    let dispatcher = LaunchDispatcher::new(store, &config, config.nonce.issuer());

    let ctx = LaunchContext::from_params(&params, &config.login_param);
    let mut session = RequestSession::anonymous();
    let report = dispatcher.handle_launch(&ctx, &mut session);

    let out = serde_json::json!({
        "route": report.route.as_str(),
        "location": report.redirect.location,
        "account": report.resolve.and_then(|r| r.account()),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(SUCCESS)
}

/// Scalar values become strings; LMS parameters are strings on the wire.
pub(crate) fn read_params(path: &Path) -> anyhow::Result<HashMap<String, String>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading launch parameters {}", path.display()))?;
    let raw: BTreeMap<String, Value> = serde_yaml::from_str(&text)
        .with_context(|| format!("parsing launch parameters {}", path.display()))?;

    let mut params = HashMap::with_capacity(raw.len());
    for (key, value) in raw {
        let value = match value {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::String(s) => s,
            other => anyhow::bail!("parameter '{key}' is not a scalar: {other:?}"),
        };
        params.insert(key, value);
    }
    Ok(params)
}
