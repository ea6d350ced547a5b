/// Stores a strum enum in a `VARCHAR` column using its `AsRef<str>` /
/// `FromStr` names, so reads accept any text column rather than only `ENUM`.
macro_rules! text_column {
    ($ty:ident) => {
        impl sqlx::Type<sqlx::MySql> for $ty {
            fn type_info() -> sqlx::mysql::MySqlTypeInfo {
                <str as sqlx::Type<sqlx::MySql>>::type_info()
            }

            fn compatible(ty: &sqlx::mysql::MySqlTypeInfo) -> bool {
                <str as sqlx::Type<sqlx::MySql>>::compatible(ty)
            }
        }

        impl sqlx::Encode<'_, sqlx::MySql> for $ty {
            fn encode_by_ref(&self, buf: &mut Vec<u8>) -> sqlx::encode::IsNull {
                <&str as sqlx::Encode<sqlx::MySql>>::encode(self.as_ref(), buf)
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::MySql> for $ty {
            fn decode(
                value: sqlx::mysql::MySqlValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let raw = <&str as sqlx::Decode<'r, sqlx::MySql>>::decode(value)?;
                Ok(raw.parse::<$ty>()?)
            }
        }
    };
}

pub mod attendance;
pub mod leave;
pub mod role;
pub mod user;
