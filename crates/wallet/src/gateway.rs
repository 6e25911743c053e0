use {
    async_trait::async_trait,
    chroma_config::NetworkConfig,
    chroma_rpc::RpcClient,
    chroma_session::{ConnectError, NetworkGateway},
    tracing::{debug, info},
};

/// A verified link to one node of the configured network.
#[derive(Debug, Clone)]
pub struct NearConnection {
    pub config: NetworkConfig,
    pub rpc: RpcClient,
}

/// Connects over JSON-RPC and checks the node serves the configured chain.
#[derive(Debug, Clone, Default)]
pub struct NearGateway;

#[async_trait]
impl NetworkGateway for NearGateway {
    type Connection = NearConnection;

    async fn connect(&self, config: &NetworkConfig) -> Result<NearConnection, ConnectError> {
        let rpc = RpcClient::new(&config.node_url)
            .map_err(|e| ConnectError::InvalidConfig(format!("{e:#}")))?;

        debug!(node = %config.node_url, "probing node status");
        let status = rpc.status().await.map_err(|e| ConnectError::Unreachable {
            node_url: config.node_url.clone(),
            reason: format!("{e:#}"),
        })?;

        if status.chain_id != config.network_id {
            return Err(ConnectError::WrongNetwork {
                expected: config.network_id.clone(),
                actual: status.chain_id,
            });
        }

        info!(network = %config.network_id, node = %config.node_url, "connected");
        Ok(NearConnection {
            config: config.clone(),
            rpc,
        })
    }
}
