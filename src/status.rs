use anyhow::Result;

use crate::cluster::{BucketTopology, ClusterConnector, ClusterSession, RestConnector};
use crate::config::Config;

/// `seed status`: list the scopes and collections of the configured bucket.
pub async fn run_status(config: &Config) -> Result<()> {
    let connector = RestConnector::new(&config.cluster)?;
    let session = connector.connect().await?;
    let topology = session.scope_topology(&config.cluster.bucket).await?;

    println!("bucket {}", config.cluster.bucket);
    print!("{}", render_topology(&topology, &config.cluster.scope));
    Ok(())
}

/// One line per collection; the configured scope is marked with `*`.
pub fn render_topology(topology: &BucketTopology, current_scope: &str) -> String {
    let mut out = format!("{:<2}{:<20} {}\n", "", "SCOPE", "COLLECTION");
    for scope in &topology.scopes {
        let marker = if scope.name == current_scope { "*" } else { "" };
        if scope.collections.is_empty() {
            out.push_str(&format!("{:<2}{:<20} -\n", marker, scope.name));
        }
        for collection in &scope.collections {
            out.push_str(&format!(
                "{:<2}{:<20} {}\n",
                marker, scope.name, collection.name
            ));
        }
    }
    if !topology.scopes.iter().any(|s| s.name == current_scope) {
        out.push_str(&format!("scope '{}' does not exist yet\n", current_scope));
    }
    out
}
