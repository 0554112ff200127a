use std::io::{self, Read, Write};

use aes::Aes128;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, generic_array::GenericArray};
use bytes::{Buf, BytesMut};
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use janus_codec::{CodecError, Reader, WireWrite};
use mio::Registry;
use mio::net::TcpStream;
use thiserror::Error;

/// Hard cap on a single wire packet, framed or unframed.
const MAX_PACKET_LEN: usize = 1 << 21;

const READ_CHUNK: usize = 4096;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("packet of {len} bytes exceeds the {MAX_PACKET_LEN} byte limit")]
    OversizedPacket { len: usize },

    #[error("decompressed body was {actual} bytes, header claimed {expected}")]
    BadDecompression { expected: usize, actual: usize },

    #[error("encryption secret must be 16 bytes")]
    BadSecret,
}

type Cfb8Encryptor = cfb8::Encryptor<Aes128>;
type Cfb8Decryptor = cfb8::Decryptor<Aes128>;

/// AES-128/CFB8 stream cipher state, one direction each way. Key and IV are
/// both the session's shared secret.
struct Cipher {
    encryptor: Cfb8Encryptor,
    decryptor: Cfb8Decryptor,
}

impl Cipher {
    fn new(secret: &[u8]) -> Result<Self, SessionError> {
        let encryptor =
            Cfb8Encryptor::new_from_slices(secret, secret).map_err(|_| SessionError::BadSecret)?;
        let decryptor =
            Cfb8Decryptor::new_from_slices(secret, secret).map_err(|_| SessionError::BadSecret)?;
        Ok(Self {
            encryptor,
            decryptor,
        })
    }

    fn encrypt(&mut self, data: &mut [u8]) {
        for byte in data {
            self.encryptor
                .encrypt_block_mut(GenericArray::from_mut_slice(std::slice::from_mut(byte)));
        }
    }

    fn decrypt(&mut self, data: &mut [u8]) {
        for byte in data {
            self.decryptor
                .decrypt_block_mut(GenericArray::from_mut_slice(std::slice::from_mut(byte)));
        }
    }
}

fn zlib_compress(data: &[u8]) -> Result<Vec<u8>, SessionError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

fn zlib_decompress(data: &[u8], expected: usize) -> Result<Vec<u8>, SessionError> {
    let mut out = Vec::with_capacity(expected);
    ZlibDecoder::new(data)
        .take(expected as u64 + 1)
        .read_to_end(&mut out)?;
    if out.len() != expected {
        return Err(SessionError::BadDecompression {
            expected,
            actual: out.len(),
        });
    }
    Ok(out)
}

/// Wraps a packet body in the outer wire framing.
///
/// With compression disabled (`threshold < 0`) the frame is just a varint
/// length and the body. With compression enabled, a body strictly longer
/// than the threshold is deflated and prefixed with its uncompressed length;
/// anything at or below the threshold goes out uncompressed with a zero
/// data-length marker.
pub(crate) fn frame_outbound(body: &[u8], threshold: i32) -> Result<Vec<u8>, SessionError> {
    let mut frame = Vec::with_capacity(body.len() + 10);
    if threshold >= 0 {
        let mut payload = Vec::with_capacity(body.len() + 5);
        if body.len() > threshold as usize {
            payload.put_varint(body.len() as u32);
            payload.extend_from_slice(&zlib_compress(body)?);
        } else {
            payload.put_varint(0);
            payload.extend_from_slice(body);
        }
        frame.put_varint(payload.len() as u32);
        frame.extend_from_slice(&payload);
    } else {
        frame.put_varint(body.len() as u32);
        frame.extend_from_slice(body);
    }
    Ok(frame)
}

/// Pops one complete packet body off the front of `buf`, or returns `None`
/// when the frame is still incomplete. Consumes nothing until a whole frame
/// is available.
pub(crate) fn extract_frame(
    buf: &mut BytesMut,
    threshold: i32,
) -> Result<Option<Vec<u8>>, SessionError> {
    let mut reader = Reader::new(buf);
    let len = match reader.get_varint() {
        Ok(len) => len as usize,
        Err(CodecError::UnexpectedEof { .. }) => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if len > MAX_PACKET_LEN {
        return Err(SessionError::OversizedPacket { len });
    }
    if reader.remaining() < len {
        return Ok(None);
    }

    let header = reader.position();
    let raw = buf[header..header + len].to_vec();
    buf.advance(header + len);

    if threshold < 0 {
        return Ok(Some(raw));
    }

    let mut reader = Reader::new(&raw);
    let data_len = reader.get_varint()? as usize;
    if data_len > MAX_PACKET_LEN {
        return Err(SessionError::OversizedPacket { len: data_len });
    }
    let rest = reader.take_rest();
    if data_len == 0 {
        Ok(Some(rest.to_vec()))
    } else {
        Ok(Some(zlib_decompress(rest, data_len)?))
    }
}

pub(crate) struct ReadOutcome {
    pub packets: Vec<Vec<u8>>,
    pub closed: bool,
}

/// Per-socket connection state, owned exclusively by the multiplexer.
pub(crate) struct Session {
    stream: TcpStream,
    read_buf: BytesMut,
    pending_out: Vec<u8>,
    compression_threshold: i32,
    cipher: Option<Cipher>,
}

impl Session {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            read_buf: BytesMut::with_capacity(READ_CHUNK),
            pending_out: Vec::new(),
            compression_threshold: -1,
            cipher: None,
        }
    }

    pub fn set_compression(&mut self, threshold: i32) {
        self.compression_threshold = threshold;
    }

    pub fn enable_encryption(&mut self, secret: &[u8]) -> Result<(), SessionError> {
        self.cipher = Some(Cipher::new(secret)?);
        Ok(())
    }

    pub fn deregister(&mut self, registry: &Registry) -> io::Result<()> {
        registry.deregister(&mut self.stream)
    }

    /// Drains the socket, decrypting as bytes arrive, and reassembles any
    /// complete wire packets buffered so far.
    pub fn receive(&mut self) -> Result<ReadOutcome, SessionError> {
        let mut closed = false;
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    closed = true;
                    break;
                }
                Ok(n) => {
                    let data = &mut chunk[..n];
                    if let Some(cipher) = &mut self.cipher {
                        cipher.decrypt(data);
                    }
                    self.read_buf.extend_from_slice(data);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) if e.kind() == io::ErrorKind::ConnectionReset => {
                    closed = true;
                    break;
                }
                Err(e) => return Err(e.into()),
            }
        }

        let mut packets = Vec::new();
        while let Some(body) = extract_frame(&mut self.read_buf, self.compression_threshold)? {
            packets.push(body);
        }
        Ok(ReadOutcome { packets, closed })
    }

    /// Frames, optionally encrypts, and queues a packet body, then flushes
    /// as much as the socket will take.
    pub fn write_packet(&mut self, body: &[u8]) -> Result<(), SessionError> {
        let mut frame = frame_outbound(body, self.compression_threshold)?;
        if let Some(cipher) = &mut self.cipher {
            cipher.encrypt(&mut frame);
        }
        self.pending_out.extend_from_slice(&frame);
        self.flush()
    }

    /// Writes queued bytes until the socket would block.
    pub fn flush(&mut self) -> Result<(), SessionError> {
        while !self.pending_out.is_empty() {
            match self.stream.write(&self.pending_out) {
                Ok(0) => return Err(io::Error::from(io::ErrorKind::WriteZero).into()),
                Ok(n) => {
                    self.pending_out.drain(..n);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}
