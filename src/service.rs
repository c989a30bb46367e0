//! Async facade over the ledger and the credential store
//!
//! All writes to the chain and the pending buffer go through one
//! `tokio::sync::RwLock`, so submissions and seals are linearizable. The
//! proof-of-work search runs on the blocking pool with the lock released;
//! an atomic guard admits one seal at a time. The wallet store sits behind
//! its own short-lived `parking_lot` lock, with RSA key generation kept
//! outside it.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock as SyncRwLock;
use serde::Deserialize;
use serde_json::{json, Map};
use tokio::sync::RwLock;
use tokio::task;
use tracing::{info, warn};

use crate::block::Block;
use crate::config::LedgerConfig;
use crate::crypto::{self, Keypair};
use crate::error::{ChainError, Result};
use crate::ledger::{ChainInfo, Ledger, Participant, Role, TransactionRecord};
use crate::sealer;
use crate::transaction::{Transaction, TxKind, BROADCAST, SYSTEM};
use crate::wallet::{Wallet, WalletProfile, WalletStore};

/// Inputs for authoring an assignment.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAssignment {
    pub teacher_address: String,
    pub title: String,
    pub description: String,
    pub due_date: String,
}

/// Inputs for handing in work against an assignment.
#[derive(Debug, Clone, Deserialize)]
pub struct NewSubmission {
    pub student_address: String,
    pub assignment_id: String,
    pub content: String,
}

/// Inputs for grading a sealed submission.
#[derive(Debug, Clone, Deserialize)]
pub struct NewGrade {
    pub teacher_address: String,
    pub submission_id: String,
    pub grade: String,
    pub comment: String,
}

/// Inputs for publishing an announcement. Without targets it goes out as
/// a broadcast.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAnnouncement {
    pub teacher_address: String,
    pub title: String,
    pub message: String,
    pub targets: Option<Vec<String>>,
}

/// Shared handle onto one ledger and one credential store. Cloning is
/// cheap and clones observe the same state.
#[derive(Clone)]
pub struct LedgerService {
    ledger: Arc<RwLock<Ledger>>,
    wallets: Arc<SyncRwLock<WalletStore>>,
    is_sealing: Arc<AtomicBool>,
    blocks_sealed: Arc<AtomicU64>,
}

impl LedgerService {
    /// Creates a service over a fresh ledger. The genesis block is sealed
    /// here, so construction runs one full proof-of-work search.
    pub fn new(config: LedgerConfig) -> Result<Self> {
        let ledger = Ledger::new(config.difficulty, config.seal_reward)?;
        Ok(Self {
            ledger: Arc::new(RwLock::new(ledger)),
            wallets: Arc::new(SyncRwLock::new(WalletStore::new())),
            is_sealing: Arc::new(AtomicBool::new(false)),
            blocks_sealed: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Whether a seal is currently in flight.
    pub fn is_sealing(&self) -> bool {
        self.is_sealing.load(Ordering::Relaxed)
    }

    /// Blocks sealed through this service since startup.
    pub fn blocks_sealed(&self) -> u64 {
        self.blocks_sealed.load(Ordering::Relaxed)
    }

    // ------------------------------------------------------------------
    // Wallets and registration
    // ------------------------------------------------------------------

    /// Generates a wallet on the blocking pool and stores it. The returned
    /// record carries the private key; it is never retrievable again.
    pub async fn create_wallet(&self, role: Role, name: &str, email: &str) -> Result<Wallet> {
        let keypair = task::spawn_blocking(Keypair::generate)
            .await
            .map_err(|e| ChainError::Crypto(format!("key generation task failed: {}", e)))??;
        Ok(self.wallets.write().store_wallet(keypair, role, name, email))
    }

    /// Creates a wallet and registers its owner on the ledger in one step.
    pub async fn register(&self, role: Role, name: &str, email: &str) -> Result<Wallet> {
        let wallet = self.create_wallet(role, name, email).await?;
        self.ledger
            .write()
            .await
            .register(role, &wallet.public_pem, name, email)?;
        Ok(wallet)
    }

    /// Private-key-free view of a stored wallet.
    pub fn profile(&self, address: &str) -> Option<WalletProfile> {
        self.wallets.read().profile(address)
    }

    /// The registered participant behind an address, if any.
    pub async fn participant(&self, address: &str) -> Option<Participant> {
        self.ledger.read().await.participant(address).cloned()
    }

    /// Every registered participant, ordered by registration time.
    pub async fn list_participants(&self) -> Vec<Participant> {
        self.ledger.read().await.list_participants()
    }

    // ------------------------------------------------------------------
    // Chain operations
    // ------------------------------------------------------------------

    /// Queues an externally built transaction.
    pub async fn submit(&self, transaction: Transaction) -> Result<()> {
        self.ledger.write().await.submit(transaction)
    }

    /// Seals the pending buffer into the next block. Only one seal runs at
    /// a time; the snapshot is taken under the ledger lock, the search runs
    /// on a blocking worker with the lock released, and the commit
    /// re-verifies linkage under the write lock. Transactions submitted
    /// while the search runs stay pending for the next seal.
    ///
    /// The search-and-commit runs on its own task, and the in-flight guard
    /// is released there. A caller that stops waiting does not cancel the
    /// seal; it completes in the background.
    pub async fn seal_pending(&self, sealer_address: &str) -> Result<Block> {
        if self
            .is_sealing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ChainError::SealInProgress);
        }

        let ledger = Arc::clone(&self.ledger);
        let is_sealing = Arc::clone(&self.is_sealing);
        let blocks_sealed = Arc::clone(&self.blocks_sealed);
        let sealer_address = sealer_address.to_string();
        let seal = task::spawn(async move {
            let result = Self::seal_on_task(ledger, &sealer_address).await;
            if result.is_ok() {
                blocks_sealed.fetch_add(1, Ordering::SeqCst);
            }
            is_sealing.store(false, Ordering::SeqCst);
            result
        });

        seal.await
            .map_err(|e| ChainError::InvalidBlock(format!("sealing task failed: {}", e)))?
    }

    async fn seal_on_task(ledger: Arc<RwLock<Ledger>>, sealer_address: &str) -> Result<Block> {
        let (candidate, difficulty) = {
            let ledger = ledger.read().await;
            (ledger.candidate_block()?, ledger.difficulty)
        };
        info!(
            index = candidate.index,
            transactions = candidate.transactions.len(),
            "seal started"
        );

        let sealed = task::spawn_blocking(move || sealer::seal_block(candidate, difficulty))
            .await
            .map_err(|e| ChainError::InvalidBlock(format!("sealing task failed: {}", e)))??;

        let commit = ledger
            .write()
            .await
            .commit_sealed(sealed.clone(), sealer_address);
        if let Err(e) = commit {
            warn!(index = sealed.index, error = %e, "sealed block rejected at commit");
            return Err(e);
        }
        Ok(sealed)
    }

    /// Full-chain verification.
    pub async fn validate(&self) -> bool {
        self.ledger.read().await.validate()
    }

    /// By-value snapshot of every sealed block.
    pub async fn export_chain(&self) -> Vec<Block> {
        self.ledger.read().await.export_chain()
    }

    /// By-value snapshot of the pending buffer.
    pub async fn pending_transactions(&self) -> Vec<Transaction> {
        self.ledger.read().await.pending_transactions()
    }

    /// Summary of chain length, pending load, registry size and validity.
    pub async fn info(&self) -> ChainInfo {
        self.ledger.read().await.info()
    }

    /// Sealed transaction counts per kind.
    pub async fn tally_by_kind(&self) -> BTreeMap<TxKind, usize> {
        self.ledger.read().await.tally_by_kind()
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub async fn transactions_for(&self, address: &str) -> Vec<TransactionRecord> {
        self.ledger.read().await.transactions_for(address)
    }

    pub async fn assignments_for(&self, student: Option<&str>) -> Vec<TransactionRecord> {
        self.ledger.read().await.assignments_for(student)
    }

    pub async fn submissions_for(&self, assignment_id: &str) -> Vec<TransactionRecord> {
        self.ledger.read().await.submissions_for(assignment_id)
    }

    pub async fn grades_for(&self, student: &str) -> Vec<TransactionRecord> {
        self.ledger.read().await.grades_for(student)
    }

    pub async fn submission_by_id(&self, transaction_id: &str) -> Option<TransactionRecord> {
        self.ledger.read().await.submission_by_id(transaction_id)
    }

    // ------------------------------------------------------------------
    // Education flows
    // ------------------------------------------------------------------

    /// Authors an assignment broadcast to every student. The issuer must
    /// be a registered teacher; their encryption public key rides along in
    /// the data so students can submit confidentially.
    pub async fn create_assignment(&self, request: NewAssignment) -> Result<Transaction> {
        self.require_role(
            &request.teacher_address,
            Role::Teacher,
            "only teachers can create assignments",
        )
        .await?;
        let encryption_keys = self.encryption_keys_for(&request.teacher_address).await?;

        let mut data = Map::new();
        data.insert("title".to_string(), json!(request.title));
        data.insert("description".to_string(), json!(request.description));
        data.insert("due_date".to_string(), json!(request.due_date));
        data.insert(
            "encryption_public_key".to_string(),
            json!(encryption_keys.public_pem),
        );

        let mut tx = Transaction::new(
            request.teacher_address.clone(),
            BROADCAST,
            TxKind::Assignment,
            data,
        )?;
        self.sign_as(&mut tx, &request.teacher_address)?;
        self.ledger.write().await.submit(tx.clone())?;
        Ok(tx)
    }

    /// Records a student's submission. The receiver of record is the
    /// system rather than any teacher; `content` may already be encrypted
    /// with the assignment's encryption public key.
    pub async fn submit_assignment(&self, request: NewSubmission) -> Result<Transaction> {
        let student = self
            .participant(&request.student_address)
            .await
            .ok_or_else(|| {
                ChainError::NotFound(format!(
                    "participant {} is not registered",
                    request.student_address
                ))
            })?;

        let mut data = Map::new();
        data.insert("assignment_id".to_string(), json!(request.assignment_id));
        data.insert("content".to_string(), json!(request.content));
        data.insert("student_name".to_string(), json!(student.name));

        let mut tx = Transaction::new(
            request.student_address.clone(),
            SYSTEM,
            TxKind::Submission,
            data,
        )?;
        self.sign_as(&mut tx, &request.student_address)?;
        self.ledger.write().await.submit(tx.clone())?;
        Ok(tx)
    }

    /// Issues a grade for a sealed submission, addressed to its author. A
    /// second grade by the same teacher for the same student and
    /// assignment is rejected once the first one is sealed.
    pub async fn grade_submission(&self, request: NewGrade) -> Result<Transaction> {
        self.require_role(
            &request.teacher_address,
            Role::Teacher,
            "only teachers can grade submissions",
        )
        .await?;

        let (student, assignment_id) = {
            let ledger = self.ledger.read().await;
            let submission = ledger
                .submission_by_id(&request.submission_id)
                .ok_or_else(|| {
                    ChainError::NotFound(format!(
                        "submission {} not found in any sealed block",
                        request.submission_id
                    ))
                })?;
            let student = submission.transaction.sender.clone();
            let assignment_id = submission
                .transaction
                .data_str("assignment_id")
                .unwrap_or_default()
                .to_string();
            if ledger.has_teacher_graded(&request.teacher_address, &student, &assignment_id) {
                return Err(ChainError::AlreadyGraded {
                    assignment_id,
                    student,
                });
            }
            (student, assignment_id)
        };
        info!(
            submission = %request.submission_id,
            %student,
            assignment = %assignment_id,
            "grade accepted"
        );

        let mut data = Map::new();
        data.insert("submission_id".to_string(), json!(request.submission_id));
        data.insert("grade".to_string(), json!(request.grade));
        data.insert("comment".to_string(), json!(request.comment));

        let mut tx = Transaction::new(
            request.teacher_address.clone(),
            student,
            TxKind::Grade,
            data,
        )?;
        self.sign_as(&mut tx, &request.teacher_address)?;
        self.ledger.write().await.submit(tx.clone())?;
        Ok(tx)
    }

    /// Publishes an announcement, broadcast or targeted. Multiple targets
    /// are carried as a comma-joined receiver.
    pub async fn create_announcement(&self, request: NewAnnouncement) -> Result<Transaction> {
        self.require_role(
            &request.teacher_address,
            Role::Teacher,
            "only teachers can post announcements",
        )
        .await?;

        let receiver = match &request.targets {
            Some(targets) if !targets.is_empty() => targets.join(","),
            _ => BROADCAST.to_string(),
        };

        let mut data = Map::new();
        data.insert("title".to_string(), json!(request.title));
        data.insert("message".to_string(), json!(request.message));

        let mut tx = Transaction::new(
            request.teacher_address.clone(),
            receiver,
            TxKind::Announcement,
            data,
        )?;
        self.sign_as(&mut tx, &request.teacher_address)?;
        self.ledger.write().await.submit(tx.clone())?;
        Ok(tx)
    }

    // ------------------------------------------------------------------
    // Confidential submissions
    // ------------------------------------------------------------------

    /// Get-or-create the issuer's encryption keypair. Both halves go to
    /// the immediate caller; only the public half ever leaves the store
    /// through other paths.
    pub async fn issue_encryption_keys(&self, issuer: &str) -> Result<Keypair> {
        self.encryption_keys_for(issuer).await
    }

    /// The issuer's public encryption key, if one has been created.
    pub fn encryption_public_key(&self, issuer: &str) -> Result<String> {
        self.wallets
            .read()
            .encryption_keys(issuer)
            .map(|keys| keys.public_pem.clone())
            .ok_or_else(|| ChainError::NotFound(format!("no encryption keys for {}", issuer)))
    }

    /// Decrypts a confidential submission with the issuer's stored
    /// encryption private key.
    pub fn decrypt_submission(&self, issuer: &str, ciphertext_b64: &str) -> Result<Vec<u8>> {
        let private_pem = self
            .wallets
            .read()
            .encryption_keys(issuer)
            .map(|keys| keys.private_pem.clone())
            .ok_or_else(|| ChainError::NotFound(format!("no encryption keys for {}", issuer)))?;
        crypto::decrypt_with(&private_pem, ciphertext_b64)
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    async fn require_role(&self, address: &str, role: Role, denial: &str) -> Result<()> {
        match self.ledger.read().await.participant(address) {
            Some(participant) if participant.role == role => Ok(()),
            Some(_) => Err(ChainError::RoleViolation(denial.to_string())),
            None => Err(ChainError::NotFound(format!(
                "participant {} is not registered",
                address
            ))),
        }
    }

    /// Signs with the stored wallet for `address` when there is one;
    /// externally held keys leave the transaction unsigned.
    fn sign_as(&self, tx: &mut Transaction, address: &str) -> Result<()> {
        let private_pem = self
            .wallets
            .read()
            .wallet(address)
            .map(|wallet| wallet.private_pem.clone());
        match private_pem {
            Some(pem) => tx.sign(&pem),
            None => Ok(()),
        }
    }

    async fn encryption_keys_for(&self, issuer: &str) -> Result<Keypair> {
        if let Some(existing) = self.wallets.read().encryption_keys(issuer) {
            return Ok(existing.clone());
        }
        let fresh = task::spawn_blocking(Keypair::generate)
            .await
            .map_err(|e| ChainError::Crypto(format!("key generation task failed: {}", e)))??;

        let mut wallets = self.wallets.write();
        if let Some(existing) = wallets.encryption_keys(issuer) {
            // another task won the race while we were generating
            return Ok(existing.clone());
        }
        Ok(wallets.store_encryption_keys(issuer, fresh))
    }
}
