//! Resumable RSA operations.
//!
//! Every operation runs as a small state machine over the key's single
//! operation slot:
//!
//! ```text
//! encrypt / sign:    None -> Pad -> Exponentiate -> Result
//! decrypt / verify:  None -> Exponentiate -> Unpad -> Result
//! ```
//!
//! The position is stored in the slot, so when an [`Accelerator`] answers
//! [`Offload::Pending`] the operation returns [`Progress::Pending`] and the
//! next call with the same request continues from `Exponentiate` instead of
//! padding again. Whatever way a call ends, other than suspending, the slot
//! is reset to [`OperationState::None`] and its scratch buffer is zeroed.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

use num_bigint::BigUint;
use num_traits::Zero;
use rand_core::CryptoRngCore;
use zeroize::{Zeroize, Zeroizing};

use crate::accel::{Accelerator, Exponent, ExponentiationJob, Offload};
use crate::algorithms::pad::{uint_to_be_pad, uint_to_zeroizing_be_pad};
use crate::algorithms::rsa::{
    check_ciphertext_range, rsa_decrypt, rsa_decrypt_and_check, rsa_encrypt,
};
use crate::config::EngineConfig;
use crate::dummy_rng::DummyRng;
use crate::errors::{Error, Result};
use crate::key::{RsaPrivateKey, RsaPublicKey};
use crate::padding::{Direction, Padding};
use crate::traits::PublicKeyParts;

/// The four RSA operations.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum OperationKind {
    /// Pad, then apply the public exponent.
    PublicEncrypt,
    /// Apply the public exponent, then strip signature padding.
    PublicDecrypt,
    /// Pad for signing, then apply the private exponent.
    PrivateEncrypt,
    /// Apply the private exponent, then strip encryption padding.
    PrivateDecrypt,
}

impl OperationKind {
    fn exponent(self) -> Exponent {
        match self {
            OperationKind::PublicEncrypt | OperationKind::PublicDecrypt => Exponent::Public,
            OperationKind::PrivateEncrypt | OperationKind::PrivateDecrypt => Exponent::Private,
        }
    }

    fn direction(self) -> Direction {
        match self {
            OperationKind::PublicEncrypt | OperationKind::PrivateDecrypt => Direction::Encrypt,
            OperationKind::PrivateEncrypt | OperationKind::PublicDecrypt => Direction::Sign,
        }
    }

    /// Padding is applied before exponentiating rather than removed after.
    fn pads(self) -> bool {
        matches!(
            self,
            OperationKind::PublicEncrypt | OperationKind::PrivateEncrypt
        )
    }
}

/// Position of the in-flight operation of a key.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Hash)]
pub enum OperationState {
    /// No operation in flight.
    #[default]
    None,
    /// Building the padded block.
    Pad,
    /// Waiting for or computing the modular exponentiation.
    Exponentiate,
    /// Validating and stripping padding.
    Unpad,
    /// Output ready to be handed back.
    Result,
}

/// Input of one operation.
#[derive(Debug, Clone, Copy)]
pub struct OperationRequest<'a> {
    /// Operation to perform.
    pub kind: OperationKind,
    /// Message, digest, ciphertext or signature.
    pub input: &'a [u8],
    /// Padding scheme.
    pub padding: &'a Padding,
    /// For [`OperationKind::PublicDecrypt`], the digest the signature must
    /// cover. Required for PSS.
    pub hashed: Option<&'a [u8]>,
}

impl<'a> OperationRequest<'a> {
    /// Creates a request without an expected digest.
    pub fn new(kind: OperationKind, input: &'a [u8], padding: &'a Padding) -> Self {
        Self {
            kind,
            input,
            padding,
            hashed: None,
        }
    }

    /// Sets the digest a signature is checked against.
    pub fn with_hashed(mut self, hashed: &'a [u8]) -> Self {
        self.hashed = Some(hashed);
        self
    }
}

/// Outcome of one call into the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    /// The operation finished with this output.
    Ready(Vec<u8>),
    /// The exponentiation was handed to an accelerator and has not
    /// finished; call again with the same request.
    Pending,
}

impl Progress {
    /// Returns the output, mapping [`Progress::Pending`] to [`Error::Pending`].
    pub fn into_output(self) -> Result<Vec<u8>> {
        match self {
            Progress::Ready(out) => Ok(out),
            Progress::Pending => Err(Error::Pending),
        }
    }

    /// Returns `true` for [`Progress::Pending`].
    pub fn is_pending(&self) -> bool {
        matches!(self, Progress::Pending)
    }
}

/// Borrowed key handed to the state machine and to accelerators.
#[derive(Debug, Clone, Copy)]
pub enum KeyRef<'a> {
    /// Public key only.
    Public(&'a RsaPublicKey),
    /// Full key pair.
    Private(&'a RsaPrivateKey),
}

impl<'a> KeyRef<'a> {
    /// Public half of the key.
    pub fn public_key(&self) -> &'a RsaPublicKey {
        match *self {
            KeyRef::Public(key) => key,
            KeyRef::Private(key) => key.as_ref(),
        }
    }

    /// Private key, if present.
    pub fn private_key(&self) -> Option<&'a RsaPrivateKey> {
        match *self {
            KeyRef::Public(_) => None,
            KeyRef::Private(key) => Some(key),
        }
    }
}

impl PublicKeyParts for KeyRef<'_> {
    fn n(&self) -> &BigUint {
        self.public_key().n()
    }

    fn e(&self) -> &BigUint {
        self.public_key().e()
    }
}

/// State and scratch buffer of the single operation a key may have in
/// flight.
#[derive(Default)]
pub(crate) struct OperationSlot {
    state: OperationState,
    kind: Option<OperationKind>,
    padding: Option<Padding>,
    scratch: Zeroizing<Vec<u8>>,
}

impl OperationSlot {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn state(&self) -> OperationState {
        self.state
    }

    pub(crate) fn reset(&mut self) {
        if self.state != OperationState::None {
            tracing::trace!(from = ?self.state, "rsa operation slot reset");
        }
        self.state = OperationState::None;
        self.kind = None;
        self.padding = None;
        self.scratch.zeroize();
    }

    fn transition(&mut self, next: OperationState) {
        tracing::trace!(from = ?self.state, to = ?next, "rsa operation state");
        self.state = next;
    }

    /// Replaces the scratch contents with `data`, left-padded with zeros to
    /// `len` bytes.
    fn load(&mut self, data: &[u8], len: usize) -> Result<()> {
        if data.len() > len {
            return Err(Error::Internal);
        }

        self.scratch.zeroize();
        self.scratch
            .try_reserve_exact(len)
            .map_err(|_| Error::MemoryExhausted)?;
        self.scratch.resize(len - data.len(), 0);
        self.scratch.extend_from_slice(data);
        Ok(())
    }
}

/// Resets the slot when dropped unless the operation was suspended.
struct SlotGuard<'s> {
    slot: &'s mut OperationSlot,
    suspended: bool,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        if !self.suspended {
            self.slot.reset();
        }
    }
}

/// Runs `request` against `key` until it completes, fails or is suspended.
pub(crate) fn drive<R: CryptoRngCore + ?Sized>(
    key: KeyRef<'_>,
    slot: &mut OperationSlot,
    mut accelerator: Option<&mut (dyn Accelerator + 'static)>,
    config: &EngineConfig,
    rng: &mut R,
    request: &OperationRequest<'_>,
) -> Result<Progress> {
    let resuming = slot.state != OperationState::None;
    if resuming
        && (slot.kind != Some(request.kind) || slot.padding.as_ref() != Some(request.padding))
    {
        tracing::debug!(
            in_flight = ?slot.kind,
            requested = ?request.kind,
            "request does not match the suspended operation"
        );
        slot.reset();
        return Err(Error::InvalidArgument);
    }

    let mut guard = SlotGuard {
        slot,
        suspended: false,
    };

    if resuming {
        tracing::debug!(kind = ?request.kind, state = ?guard.slot.state, "resuming rsa operation");
    } else {
        begin(key, &mut *guard.slot, request)?;
    }

    let key_bits = key.bits();
    let k = key.size();
    let direction = request.kind.direction();

    loop {
        match guard.slot.state {
            OperationState::Pad => {
                let block = request
                    .padding
                    .pad(rng, request.input, key_bits, direction)?;
                guard.slot.load(&block, k)?;
                guard.slot.transition(OperationState::Exponentiate);
            }
            OperationState::Exponentiate => {
                let offload = exponentiate(
                    key,
                    &guard.slot.scratch,
                    request.kind,
                    accelerator.as_deref_mut(),
                    config,
                    rng,
                )?;

                match offload {
                    Offload::Pending => {
                        guard.suspended = true;
                        tracing::debug!(kind = ?request.kind, "rsa exponentiation pending");
                        return Ok(Progress::Pending);
                    }
                    Offload::Complete(out) => {
                        let out = Zeroizing::new(out);
                        guard.slot.load(&out, k)?;
                        guard.slot.transition(if request.kind.pads() {
                            OperationState::Result
                        } else {
                            OperationState::Unpad
                        });
                    }
                }
            }
            OperationState::Unpad => {
                let out =
                    request
                        .padding
                        .unpad(&mut guard.slot.scratch, key_bits, direction, request.hashed)?;
                guard.slot.load(&out, out.len())?;
                guard.slot.transition(OperationState::Result);
            }
            OperationState::Result => {
                let mut out = Vec::new();
                out.try_reserve_exact(guard.slot.scratch.len())
                    .map_err(|_| Error::MemoryExhausted)?;
                out.extend_from_slice(&guard.slot.scratch);
                tracing::trace!(kind = ?request.kind, len = out.len(), "rsa operation complete");
                return Ok(Progress::Ready(out));
            }
            OperationState::None => return Err(Error::Internal),
        }
    }
}

/// Validates a fresh request and records it in the slot.
fn begin(key: KeyRef<'_>, slot: &mut OperationSlot, request: &OperationRequest<'_>) -> Result<()> {
    if key.n().is_zero() {
        return Err(Error::InvalidModulus);
    }
    if request.kind.exponent() == Exponent::Private && key.private_key().is_none() {
        return Err(Error::InvalidArgument);
    }

    slot.kind = Some(request.kind);
    slot.padding = Some(request.padding.clone());

    if request.kind.pads() {
        slot.transition(OperationState::Pad);
    } else {
        let k = key.size();
        if request.input.len() != k {
            return Err(Error::InvalidArgument);
        }
        slot.load(request.input, k)?;
        slot.transition(OperationState::Exponentiate);
    }

    Ok(())
}

/// Applies the exponent selected by `kind` to the `k`-byte `input`.
fn exponentiate<R: CryptoRngCore + ?Sized>(
    key: KeyRef<'_>,
    input: &[u8],
    kind: OperationKind,
    accelerator: Option<&mut (dyn Accelerator + 'static)>,
    config: &EngineConfig,
    rng: &mut R,
) -> Result<Offload> {
    let c = Zeroizing::new(BigUint::from_bytes_be(input));
    if kind == OperationKind::PrivateDecrypt && config.range_check {
        check_ciphertext_range(&key, &c)?;
    }

    let exponent = kind.exponent();
    if exponent == Exponent::Public && *c >= *key.n() {
        return Err(Error::OutOfRange);
    }

    if let Some(accelerator) = accelerator {
        let offload = accelerator.submit(&ExponentiationJob {
            exponent,
            input,
            key,
        })?;

        if let Offload::Complete(out) = &offload {
            if out.len() > key.size() {
                return Err(Error::Internal);
            }
            if exponent == Exponent::Private && config.verify_crt {
                let m = Zeroizing::new(BigUint::from_bytes_be(out));
                if m.modpow(key.e(), key.n()) != *c {
                    tracing::warn!("accelerated private key operation failed its consistency check");
                    return Err(Error::Internal);
                }
            }
        }

        return Ok(offload);
    }

    let out = match exponent {
        Exponent::Public => uint_to_be_pad(rsa_encrypt(&key, &c)?, key.size())?,
        Exponent::Private => {
            let priv_key = key.private_key().ok_or(Error::InvalidArgument)?;
            let rng = if config.blinding { Some(rng) } else { None };
            let m = if config.verify_crt {
                rsa_decrypt_and_check(priv_key, rng, &c)?
            } else {
                rsa_decrypt(rng, priv_key, &c)?
            };
            uint_to_zeroizing_be_pad(m, key.size())?
        }
    };

    Ok(Offload::Complete(out))
}

enum KeyMaterial {
    Public(RsaPublicKey),
    Private(RsaPrivateKey),
}

impl KeyMaterial {
    fn as_key_ref(&self) -> KeyRef<'_> {
        match self {
            KeyMaterial::Public(key) => KeyRef::Public(key),
            KeyMaterial::Private(key) => KeyRef::Private(key),
        }
    }
}

/// An RSA key together with the state of its in-flight operation.
///
/// A key runs at most one operation at a time. When an attached
/// [`Accelerator`] defers an exponentiation, the operation methods return
/// [`Error::Pending`] (or [`Progress::Pending`] from [`RsaKey::process`]) and
/// keep the padded block; calling the same method again with the same
/// arguments continues the operation. [`RsaKey::cancel`] abandons it.
pub struct RsaKey {
    material: KeyMaterial,
    slot: OperationSlot,
    accelerator: Option<Box<dyn Accelerator>>,
    config: EngineConfig,
}

impl fmt::Debug for RsaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaKey")
            .field("key", &self.material.as_key_ref())
            .field("state", &self.slot.state())
            .field("accelerated", &self.accelerator.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl From<RsaPrivateKey> for RsaKey {
    fn from(key: RsaPrivateKey) -> Self {
        Self::new(KeyMaterial::Private(key))
    }
}

impl From<RsaPublicKey> for RsaKey {
    fn from(key: RsaPublicKey) -> Self {
        Self::new(KeyMaterial::Public(key))
    }
}

impl RsaKey {
    fn new(material: KeyMaterial) -> Self {
        Self {
            material,
            slot: OperationSlot::new(),
            accelerator: None,
            config: EngineConfig::default(),
        }
    }

    /// Generates a key pair of `bits` bits with public exponent `exp`.
    pub fn generate<R: CryptoRngCore + ?Sized>(rng: &mut R, bits: usize, exp: u64) -> Result<Self> {
        RsaPrivateKey::new_with_exp(rng, bits, &BigUint::from(exp)).map(Self::from)
    }

    /// Replaces the engine configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Attaches an accelerator that performs every exponentiation.
    pub fn with_accelerator(mut self, accelerator: impl Accelerator + 'static) -> Self {
        self.set_accelerator(Some(Box::new(accelerator)));
        self
    }

    /// Attaches or removes the accelerator. Any in-flight operation is
    /// cancelled.
    pub fn set_accelerator(&mut self, accelerator: Option<Box<dyn Accelerator>>) {
        self.cancel();
        self.accelerator = accelerator;
    }

    /// Current engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Public half of the key.
    pub fn public_key(&self) -> &RsaPublicKey {
        self.material.as_key_ref().public_key()
    }

    /// Private key, if this key has one.
    pub fn private_key(&self) -> Option<&RsaPrivateKey> {
        self.material.as_key_ref().private_key()
    }

    /// Size of ciphertexts and signatures, the modulus length in bytes.
    pub fn encrypt_size(&self) -> usize {
        self.public_key().size()
    }

    /// Big-endian encodings of the public exponent and the modulus.
    pub fn export_public(&self) -> Result<(Vec<u8>, Vec<u8>)> {
        let key = self.public_key();
        if key.n().is_zero() {
            return Err(Error::InvalidModulus);
        }
        Ok((key.e().to_bytes_be(), key.n().to_bytes_be()))
    }

    /// Position of the in-flight operation.
    pub fn operation_state(&self) -> OperationState {
        self.slot.state()
    }

    /// Abandons the in-flight operation, if any, and zeroes its scratch
    /// buffer.
    pub fn cancel(&mut self) {
        if self.slot.state() != OperationState::None {
            tracing::debug!(kind = ?self.slot.kind, "rsa operation cancelled");
        }
        self.slot.reset();
    }

    /// Runs or resumes `request`.
    pub fn process<R: CryptoRngCore + ?Sized>(
        &mut self,
        rng: &mut R,
        request: &OperationRequest<'_>,
    ) -> Result<Progress> {
        drive(
            self.material.as_key_ref(),
            &mut self.slot,
            self.accelerator.as_deref_mut(),
            &self.config,
            rng,
            request,
        )
    }

    /// Runs or resumes `request`, writing the output to the front of `out`.
    ///
    /// Returns the number of bytes written. Fails with
    /// [`Error::BufferTooSmall`] when the output does not fit, and with
    /// [`Error::Pending`] when the operation was suspended.
    pub fn process_into<R: CryptoRngCore + ?Sized>(
        &mut self,
        rng: &mut R,
        request: &OperationRequest<'_>,
        out: &mut [u8],
    ) -> Result<usize> {
        let output = Zeroizing::new(self.process(rng, request)?.into_output()?);
        let dst = out.get_mut(..output.len()).ok_or(Error::BufferTooSmall)?;
        dst.copy_from_slice(&output);
        Ok(output.len())
    }

    /// Encrypts `msg`.
    pub fn public_encrypt<R: CryptoRngCore + ?Sized>(
        &mut self,
        rng: &mut R,
        padding: &Padding,
        msg: &[u8],
    ) -> Result<Vec<u8>> {
        let request = OperationRequest::new(OperationKind::PublicEncrypt, msg, padding);
        self.process(rng, &request)?.into_output()
    }

    /// Decrypts `ciphertext`, which must be exactly [`RsaKey::encrypt_size`]
    /// bytes long.
    pub fn private_decrypt<R: CryptoRngCore + ?Sized>(
        &mut self,
        rng: &mut R,
        padding: &Padding,
        ciphertext: &[u8],
    ) -> Result<Vec<u8>> {
        let request = OperationRequest::new(OperationKind::PrivateDecrypt, ciphertext, padding);
        self.process(rng, &request)?.into_output()
    }

    /// Signs `digest`.
    pub fn private_sign<R: CryptoRngCore + ?Sized>(
        &mut self,
        rng: &mut R,
        padding: &Padding,
        digest: &[u8],
    ) -> Result<Vec<u8>> {
        let request = OperationRequest::new(OperationKind::PrivateEncrypt, digest, padding);
        self.process(rng, &request)?.into_output()
    }

    /// Checks that `signature` covers `hashed` and returns the recovered
    /// digest.
    pub fn public_verify(
        &mut self,
        padding: &Padding,
        signature: &[u8],
        hashed: &[u8],
    ) -> Result<Vec<u8>> {
        let request = OperationRequest::new(OperationKind::PublicDecrypt, signature, padding)
            .with_hashed(hashed);
        self.process(&mut DummyRng, &request)?.into_output()
    }

    /// Strips signature padding and returns whatever digest the signature
    /// carries, without comparing it to anything. Not available for PSS,
    /// which can only be checked against a known digest.
    pub fn public_recover(&mut self, padding: &Padding, signature: &[u8]) -> Result<Vec<u8>> {
        let request = OperationRequest::new(OperationKind::PublicDecrypt, signature, padding);
        self.process(&mut DummyRng, &request)?.into_output()
    }
}
