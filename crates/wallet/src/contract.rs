//! Contract calls: view methods over `call_function`, change methods as
//! signed function-call transactions.

use {
    async_trait::async_trait,
    chroma_rpc::{FunctionCall, RpcClient, RpcError, Transaction},
    chroma_session::{
        Account, ContractBinding, ContractCallError, ContractMethods, ContractProxy, Rgb,
    },
    serde_json::json,
    tracing::{debug, info},
};

use crate::{gateway::NearConnection, store::KeyStore};

fn rpc_error(e: &anyhow::Error) -> ContractCallError {
    ContractCallError::Rpc(format!("{e:#}"))
}

/// Binds contracts for the signed-in account, signing with keys from `keys`.
#[derive(Debug, Clone, Default)]
pub struct RpcContractProxy {
    keys: KeyStore,
}

impl RpcContractProxy {
    pub fn new(keys: KeyStore) -> Self {
        Self { keys }
    }
}

impl ContractProxy for RpcContractProxy {
    type Binding = RpcContractBinding;
    type Connection = NearConnection;

    fn bind(
        &self,
        connection: &NearConnection,
        account: &Account,
        contract_id: &str,
        methods: ContractMethods,
    ) -> RpcContractBinding {
        RpcContractBinding {
            rpc: connection.rpc.clone(),
            network_id: connection.config.network_id.clone(),
            account_id: account.identifier.clone(),
            contract_id: contract_id.to_string(),
            methods,
            keys: self.keys.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RpcContractBinding {
    rpc: RpcClient,
    network_id: String,
    account_id: String,
    contract_id: String,
    methods: ContractMethods,
    keys: KeyStore,
}

impl RpcContractBinding {
    async fn signed_call(&self, call: FunctionCall) -> Result<(), ContractCallError> {
        let key = self
            .keys
            .get_key(&self.network_id, &self.account_id)
            .map_err(|e| ContractCallError::Execution(format!("{e:#}")))?
            .ok_or_else(|| ContractCallError::MissingKey {
                account_id: self.account_id.clone(),
                network_id: self.network_id.clone(),
            })?;
        let public_key = key.public_key();

        let access_key = self
            .rpc
            .view_access_key(&self.account_id, &public_key.to_string())
            .await
            .map_err(|e| match e.downcast_ref::<RpcError>() {
                Some(rpc) if rpc.is_unknown_access_key() => ContractCallError::MissingKey {
                    account_id: self.account_id.clone(),
                    network_id: self.network_id.clone(),
                },
                _ => rpc_error(&e),
            })?;
        let block_hash = Transaction::decode_block_hash(&access_key.block_hash)
            .map_err(|e| ContractCallError::Decode(format!("{e:#}")))?;

        let nonce = access_key
            .nonce
            .checked_add(1)
            .ok_or_else(|| ContractCallError::Execution("access key nonce exhausted".into()))?;

        let method = call.method_name.clone();
        let signed = Transaction {
            signer_id: self.account_id.clone(),
            public_key,
            nonce,
            receiver_id: self.contract_id.clone(),
            block_hash,
            actions: vec![call],
        }
        .sign(&key)
        .map_err(|e| ContractCallError::Execution(format!("{e:#}")))?;

        debug!(contract = %self.contract_id, method = %method, nonce = signed.transaction.nonce, "broadcasting");
        self.rpc
            .broadcast_tx_commit(&signed)
            .await
            .map_err(|e| match e.downcast_ref::<RpcError>() {
                Some(_) => rpc_error(&e),
                None => ContractCallError::Execution(format!("{e:#}")),
            })?;
        info!(contract = %self.contract_id, method = %method, "transaction committed");
        Ok(())
    }
}

#[async_trait]
impl ContractBinding for RpcContractBinding {
    fn contract_id(&self) -> &str {
        &self.contract_id
    }

    async fn call(&self, method: &str) -> Result<Rgb, ContractCallError> {
        if !self.methods.read.contains(method) {
            return Err(ContractCallError::UndeclaredMethod(method.to_string()));
        }
        let result = self
            .rpc
            .call_function(&self.contract_id, method, &json!({}))
            .await
            .map_err(|e| rpc_error(&e))?;
        result
            .json::<Rgb>()
            .map_err(|e| ContractCallError::Decode(e.to_string()))
    }

    async fn invoke(&self, method: &str, payload: Rgb) -> Result<(), ContractCallError> {
        if !self.methods.write.contains(method) {
            return Err(ContractCallError::UndeclaredMethod(method.to_string()));
        }
        let call = FunctionCall::json(method, &payload)
            .map_err(|e| ContractCallError::Decode(format!("{e:#}")))?;
        self.signed_call(call).await
    }
}
