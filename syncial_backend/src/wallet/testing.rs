//! In-process wallet double for service tests. Answers reads by function
//! selector and records every call and write it sees.

use super::{
    ContractCall, ContractWrite, ReadConnection, ReceiptStatus, SignerKind, TransactionSigner,
    WriteReceipt,
};
use crate::error::ContractError;
use alloy::primitives::{Address, Bytes, B256};
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

pub(crate) struct FakeWallet {
    kind: SignerKind,
    address: Address,
    reads: Mutex<HashMap<[u8; 4], Result<Bytes, ContractError>>>,
    write_outcome: Mutex<Result<ReceiptStatus, ContractError>>,
    calls: Mutex<Vec<ContractCall>>,
    writes: Mutex<Vec<ContractWrite>>,
}

impl FakeWallet {
    pub(crate) fn injected(address: Address) -> Self {
        Self::new(SignerKind::Injected, address)
    }

    pub(crate) fn wallet_client(address: Address) -> Self {
        Self::new(SignerKind::WalletClient, address)
    }

    fn new(kind: SignerKind, address: Address) -> Self {
        Self {
            kind,
            address,
            reads: Mutex::new(HashMap::new()),
            write_outcome: Mutex::new(Ok(ReceiptStatus::Success)),
            calls: Mutex::new(Vec::new()),
            writes: Mutex::new(Vec::new()),
        }
    }

    /// `encoded` is the ABI return data, e.g. `(value,).abi_encode_params()`.
    pub(crate) fn answer<C: SolCall>(&self, encoded: Vec<u8>) {
        self.reads
            .lock()
            .unwrap()
            .insert(C::SELECTOR, Ok(Bytes::from(encoded)));
    }

    pub(crate) fn fail_read<C: SolCall>(&self, err: ContractError) {
        self.reads.lock().unwrap().insert(C::SELECTOR, Err(err));
    }

    pub(crate) fn fail_writes(&self, err: ContractError) {
        *self.write_outcome.lock().unwrap() = Err(err);
    }

    pub(crate) fn set_write_status(&self, status: ReceiptStatus) {
        *self.write_outcome.lock().unwrap() = Ok(status);
    }

    pub(crate) fn calls(&self) -> Vec<ContractCall> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn writes(&self) -> Vec<ContractWrite> {
        self.writes.lock().unwrap().clone()
    }

    pub(crate) fn called_selectors(&self) -> Vec<[u8; 4]> {
        self.calls()
            .iter()
            .map(|call| selector_of(&call.data))
            .collect()
    }
}

pub(crate) fn selector_of(data: &[u8]) -> [u8; 4] {
    let mut selector = [0u8; 4];
    selector.copy_from_slice(&data[..4]);
    selector
}

#[async_trait]
impl ReadConnection for FakeWallet {
    async fn call(&self, call: ContractCall) -> Result<Bytes, ContractError> {
        let selector = selector_of(&call.data);
        self.calls.lock().unwrap().push(call);
        self.reads
            .lock()
            .unwrap()
            .get(&selector)
            .cloned()
            .unwrap_or_else(|| Err(ContractError::Reverted(crate::error::RevertReason::Unknown)))
    }
}

#[async_trait]
impl TransactionSigner for FakeWallet {
    fn kind(&self) -> SignerKind {
        self.kind
    }

    fn address(&self) -> Address {
        self.address
    }

    async fn write_and_wait(&self, write: ContractWrite) -> Result<WriteReceipt, ContractError> {
        let index = {
            let mut writes = self.writes.lock().unwrap();
            writes.push(write);
            writes.len()
        };
        let status = self.write_outcome.lock().unwrap().clone()?;
        Ok(WriteReceipt::new(
            B256::with_last_byte(index as u8),
            status,
            self.kind,
        ))
    }
}
