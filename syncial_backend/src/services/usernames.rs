use super::ContractHandle;
use crate::contracts::IUsernames;
use crate::error::ContractError;
use crate::wallet::WriteReceipt;
use alloy::primitives::{Address, U256};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

pub const DEFAULT_CACHE_CAPACITY: usize = 512;
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(10 * 60);

/// Address → username lookups, bounded in size and age. A cached `None`
/// means the registry had no name for that wallet.
pub struct UsernameCache {
    ttl: Duration,
    entries: Mutex<NameEntries>,
}

type NameEntries = LruCache<Address, (Instant, Option<String>)>;

impl Default for UsernameCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL)
    }
}

impl UsernameCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            ttl,
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// `Ok(None)` on a miss; expired entries are dropped on the way.
    pub fn get(&self, address: &Address) -> Result<Option<Option<String>>, ContractError> {
        let mut entries = self.lock()?;
        let expired = match entries.get(address) {
            Some((inserted_at, name)) if inserted_at.elapsed() < self.ttl => {
                return Ok(Some(name.clone()));
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(address);
        }
        Ok(None)
    }

    pub fn insert(&self, address: Address, name: Option<String>) -> Result<(), ContractError> {
        self.lock()?.put(address, (Instant::now(), name));
        Ok(())
    }

    pub fn clear(&self) -> Result<(), ContractError> {
        self.lock()?.clear();
        Ok(())
    }

    pub fn len(&self) -> Result<usize, ContractError> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, ContractError> {
        Ok(self.lock()?.is_empty())
    }

    fn lock(&self) -> Result<MutexGuard<'_, NameEntries>, ContractError> {
        self.entries.lock().map_err(|_| ContractError::CachePoisoned)
    }
}

#[derive(Clone)]
pub struct UsernameService {
    contract: ContractHandle,
    cache: Arc<UsernameCache>,
}

impl UsernameService {
    pub fn new(contract: ContractHandle) -> Self {
        Self::with_cache(contract, Arc::new(UsernameCache::default()))
    }

    pub fn with_cache(contract: ContractHandle, cache: Arc<UsernameCache>) -> Self {
        Self { contract, cache }
    }

    pub fn cache(&self) -> Arc<UsernameCache> {
        self.cache.clone()
    }

    /// Mints `username` for the connected wallet after checking that the
    /// wallet has no name yet and the name is free.
    pub async fn mint_username(&self, username: &str) -> Result<WriteReceipt, ContractError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(ContractError::InvalidInput("Username cannot be empty".into()));
        }
        let account = self.contract.session().require_account()?;

        if let Some(existing) = self.fetch_username(account).await? {
            return Err(ContractError::InvalidInput(format!(
                "You already have a username: {existing}"
            )));
        }
        if !self.is_username_available(username).await? {
            return Err(ContractError::InvalidInput(
                "Username is already taken. Please try another.".into(),
            ));
        }

        let receipt = self
            .contract
            .write(
                &IUsernames::mintUsernameCall {
                    username: username.to_string(),
                },
                U256::ZERO,
            )
            .await?;
        if receipt.success {
            self.cache.insert(account, Some(username.to_string()))?;
        }
        Ok(receipt)
    }

    pub async fn is_username_available(&self, username: &str) -> Result<bool, ContractError> {
        self.contract
            .read(&IUsernames::isUsernameAvailableCall {
                username: username.trim().to_string(),
            })
            .await
    }

    /// The registered name for `address`, served from the cache when fresh.
    pub async fn username_of(&self, address: Address) -> Result<Option<String>, ContractError> {
        if let Some(cached) = self.cache.get(&address)? {
            return Ok(cached);
        }
        let name = self.fetch_username(address).await?;
        self.cache.insert(address, name.clone())?;
        Ok(name)
    }

    /// The wallet bound to `username`; `None` when the name is unclaimed.
    pub async fn resolve_username(&self, username: &str) -> Result<Option<Address>, ContractError> {
        let owner = self
            .contract
            .read(&IUsernames::usernamesCall {
                username: username.trim().to_string(),
            })
            .await?;
        Ok((owner != Address::ZERO).then_some(owner))
    }

    pub fn on_wallet_changed(&self) -> Result<(), ContractError> {
        tracing::debug!(entries = self.cache.len()?, "clearing username cache");
        self.cache.clear()
    }

    async fn fetch_username(&self, address: Address) -> Result<Option<String>, ContractError> {
        let name = self
            .contract
            .read(&IUsernames::getUsernameFromWalletCall { wallet: address })
            .await?;
        Ok((!name.is_empty()).then_some(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::ContractDirectory;
    use crate::services::ContractServices;
    use crate::wallet::testing::FakeWallet;
    use crate::wallet::WalletSession;
    use alloy::primitives::address;
    use alloy::sol_types::{SolCall, SolValue};

    const ME: Address = address!("00000000000000000000000000000000000000aa");
    const ALICE: Address = address!("00000000000000000000000000000000000000a1");
    const BOB: Address = address!("00000000000000000000000000000000000000b0");

    fn services(wallet: Arc<FakeWallet>) -> ContractServices {
        let session = WalletSession::builder().injected(wallet).build();
        ContractServices::new(Arc::new(session), &ContractDirectory::default())
    }

    #[test]
    fn cache_evicts_least_recently_used() {
        let cache = UsernameCache::new(2, Duration::from_secs(60));
        cache.insert(ALICE, Some("alice".into())).unwrap();
        cache.insert(BOB, Some("bob".into())).unwrap();
        assert_eq!(cache.get(&ALICE).unwrap(), Some(Some("alice".into())));
        cache.insert(ME, None).unwrap();

        assert_eq!(cache.len().unwrap(), 2);
        assert_eq!(cache.get(&BOB).unwrap(), None);
        assert_eq!(cache.get(&ME).unwrap(), Some(None));
    }

    #[test]
    fn cache_entries_expire() {
        let cache = UsernameCache::new(8, Duration::ZERO);
        cache.insert(ALICE, Some("alice".into())).unwrap();
        assert_eq!(cache.get(&ALICE).unwrap(), None);
        assert!(cache.is_empty().unwrap());
    }

    #[test]
    fn poisoned_cache_reports_an_error() {
        let cache = Arc::new(UsernameCache::default());
        let poisoner = cache.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.entries.lock().unwrap();
            panic!("poison the cache lock");
        })
        .join();

        assert!(matches!(cache.get(&ALICE), Err(ContractError::CachePoisoned)));
        assert!(matches!(cache.insert(ALICE, None), Err(ContractError::CachePoisoned)));
        assert!(matches!(cache.clear(), Err(ContractError::CachePoisoned)));
    }

    #[tokio::test]
    async fn username_lookups_are_cached() {
        let wallet = Arc::new(FakeWallet::injected(ME));
        wallet.answer::<IUsernames::getUsernameFromWalletCall>(
            ("alice".to_string(),).abi_encode_params(),
        );
        let usernames = services(wallet.clone()).usernames;

        assert_eq!(usernames.username_of(ALICE).await.unwrap().as_deref(), Some("alice"));
        assert_eq!(usernames.username_of(ALICE).await.unwrap().as_deref(), Some("alice"));
        assert_eq!(wallet.calls().len(), 1);

        usernames.on_wallet_changed().unwrap();
        usernames.username_of(ALICE).await.unwrap();
        assert_eq!(wallet.calls().len(), 2);
    }

    #[tokio::test]
    async fn switching_wallets_empties_the_shared_cache() {
        let wallet = Arc::new(FakeWallet::injected(ME));
        wallet.answer::<IUsernames::getUsernameFromWalletCall>((String::new(),).abi_encode_params());
        let services = services(wallet);
        assert_eq!(services.usernames.username_of(BOB).await.unwrap(), None);
        assert_eq!(services.usernames.cache().len().unwrap(), 1);

        let next = Arc::new(FakeWallet::injected(ALICE));
        let switched = services
            .switch_wallet(Arc::new(WalletSession::builder().injected(next).build()))
            .unwrap();
        assert!(switched.usernames.cache().is_empty().unwrap());
    }

    #[tokio::test]
    async fn mint_checks_existing_name_then_availability() {
        let wallet = Arc::new(FakeWallet::injected(ME));
        wallet.answer::<IUsernames::getUsernameFromWalletCall>((String::new(),).abi_encode_params());
        wallet.answer::<IUsernames::isUsernameAvailableCall>((true,).abi_encode_params());
        let usernames = services(wallet.clone()).usernames;

        let receipt = usernames.mint_username(" satoshi ").await.unwrap();
        assert!(receipt.success);
        assert_eq!(
            wallet.called_selectors(),
            vec![
                IUsernames::getUsernameFromWalletCall::SELECTOR,
                IUsernames::isUsernameAvailableCall::SELECTOR,
            ]
        );
        let minted = IUsernames::mintUsernameCall::abi_decode(&wallet.writes()[0].calldata).unwrap();
        assert_eq!(minted.username, "satoshi");
        assert_eq!(
            usernames.username_of(ME).await.unwrap().as_deref(),
            Some("satoshi")
        );
    }

    #[tokio::test]
    async fn mint_refuses_taken_names_without_sending() {
        let wallet = Arc::new(FakeWallet::injected(ME));
        wallet.answer::<IUsernames::getUsernameFromWalletCall>((String::new(),).abi_encode_params());
        wallet.answer::<IUsernames::isUsernameAvailableCall>((false,).abi_encode_params());
        let usernames = services(wallet.clone()).usernames;

        assert!(usernames.mint_username("taken").await.is_err());
        assert!(usernames.mint_username("").await.is_err());
        assert!(wallet.writes().is_empty());
    }

    #[tokio::test]
    async fn unbound_names_resolve_to_none() {
        let wallet = Arc::new(FakeWallet::injected(ME));
        wallet.answer::<IUsernames::usernamesCall>((Address::ZERO,).abi_encode_params());
        let usernames = services(wallet).usernames;
        assert_eq!(usernames.resolve_username("nobody").await.unwrap(), None);
    }
}
