use crate::domain::ids::{OrderId, PaymentId, UserId};
use crate::error::InputError;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Op {
    Order,
    GetOrder,
    Pay,
    Confirm,
    Payments,
}

/// One raw row of the command script. Columns unused by an op may be left empty.
#[derive(Debug, Deserialize)]
struct CommandRecord {
    op: Op,
    user: u64,
    order: Option<u64>,
    payment: Option<u64>,
    key: Option<String>,
    amount: Option<Decimal>,
    currency: Option<String>,
}

/// A request issued by an authenticated user.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateOrder {
        user_id: UserId,
        amount: Decimal,
        currency: String,
    },
    GetOrder {
        user_id: UserId,
        order_id: OrderId,
    },
    CreatePayment {
        user_id: UserId,
        order_id: OrderId,
        /// Raw header value. Blank keys are rejected by the service layer.
        idempotency_key: String,
    },
    ConfirmPayment {
        user_id: UserId,
        payment_id: PaymentId,
    },
    ListPayments {
        user_id: UserId,
        order_id: OrderId,
    },
}

impl Command {
    pub fn op(&self) -> Op {
        match self {
            Command::CreateOrder { .. } => Op::Order,
            Command::GetOrder { .. } => Op::GetOrder,
            Command::CreatePayment { .. } => Op::Pay,
            Command::ConfirmPayment { .. } => Op::Confirm,
            Command::ListPayments { .. } => Op::Payments,
        }
    }
}

fn required<T>(value: Option<T>, column: &str, op: Op) -> Result<T, InputError> {
    value.ok_or_else(|| InputError::Invalid(format!("{op:?} requires the `{column}` column")))
}

impl TryFrom<CommandRecord> for Command {
    type Error = InputError;

    fn try_from(record: CommandRecord) -> Result<Self, Self::Error> {
        let user_id = UserId(record.user);
        let op = record.op;
        let command = match op {
            Op::Order => Command::CreateOrder {
                user_id,
                amount: required(record.amount, "amount", op)?,
                currency: required(record.currency, "currency", op)?,
            },
            Op::GetOrder => Command::GetOrder {
                user_id,
                order_id: OrderId(required(record.order, "order", op)?),
            },
            Op::Pay => Command::CreatePayment {
                user_id,
                order_id: OrderId(required(record.order, "order", op)?),
                idempotency_key: record.key.unwrap_or_default(),
            },
            Op::Confirm => Command::ConfirmPayment {
                user_id,
                payment_id: PaymentId(required(record.payment, "payment", op)?),
            },
            Op::Payments => Command::ListPayments {
                user_id,
                order_id: OrderId(required(record.order, "order", op)?),
            },
        };
        Ok(command)
    }
}

/// Reads commands from a CSV source.
///
/// Wraps `csv::Reader` with whitespace trimming and flexible record lengths, so trailing empty
/// columns may be omitted.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily reads and validates commands, one item per data row.
    pub fn commands(self) -> impl Iterator<Item = Result<Command, InputError>> {
        self.reader
            .into_deserialize::<CommandRecord>()
            .map(|result| result.map_err(InputError::from).and_then(Command::try_from))
    }
}
